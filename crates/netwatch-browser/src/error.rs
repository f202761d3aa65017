//! Error types for the netwatch-browser crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the browser.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Failed to reach the DevTools HTTP or WebSocket endpoint.
    #[error("failed to connect to Chrome DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// No debuggable target with the given id exists.
    #[error("DevTools target '{target}' not found on port {port}")]
    TargetNotFound { target: String, port: u16 },

    /// A CDP command returned an error response.
    #[error("CDP error {code}: {message}")]
    CdpError {
        code: i64,
        message: String,
        data: Option<String>,
    },

    /// A CDP command timed out waiting for a response.
    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// A protocol-level error (serialization, unexpected message format, etc.).
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },
}
