//! Chrome DevTools Protocol plumbing for netwatch.
//!
//! - **`cdp`**: WebSocket client with command/response correlation and an
//!   ordered event channel.
//! - **`discovery`**: resolves a DevTools target id to its WebSocket URL via
//!   the browser's `/json/list` endpoint.
//! - **`network`**: decodes `Network.*` and `Page.frameNavigated` events into
//!   typed [`netwatch_types::LifecycleEvent`] values.
//!
//! Chrome must be running with `--remote-debugging-port`:
//!
//! ```sh
//! google-chrome --remote-debugging-port=9222
//! ```

pub mod cdp;
pub mod discovery;
pub mod error;
pub mod network;

pub use cdp::{CdpClient, CdpEvent};
pub use discovery::{resolve_target, TargetInfo};
pub use error::BrowserError;
pub use network::decode_event;
