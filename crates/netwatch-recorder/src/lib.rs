//! Live capture half of netwatch.
//!
//! A [`RecordingSession`] pulls typed lifecycle events from an
//! [`EventSource`], folds them into normalized records with the
//! [`Correlator`], and hands every change to a [`PersistenceSink`] that
//! writes debounced JSON snapshots for the diagnose command to read.

pub mod correlator;
pub mod session;
pub mod sink;
pub mod source;
pub mod timing;

pub use correlator::{Correlator, PendingRequest};
pub use session::{RecordingSession, RunEnd, SessionSummary};
pub use sink::{PersistenceSink, SinkConfig, SinkStats};
pub use source::{CdpEventSource, ChannelEventSource, EventSource};
pub use timing::normalize_timing;
