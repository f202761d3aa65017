//! Typed network lifecycle events.
//!
//! The event source decodes raw DevTools messages into [`LifecycleEvent`]
//! values; the recorder consumes them strictly in delivery order. Timestamps
//! are monotonic seconds on the browser's clock.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{Initiator, NOT_APPLICABLE};

/// One lifecycle event for a logical request, or a top-level navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    RequestStarted(RequestStarted),
    ResponseReceived(ResponseReceived),
    LoadFinished(LoadFinished),
    LoadFailed(LoadFailed),
    /// The main frame navigated; the current epoch ends.
    NavigationOccurred { url: String },
}

impl LifecycleEvent {
    /// The request id this event refers to, if it is a request event.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::RequestStarted(e) => Some(&e.request_id),
            Self::ResponseReceived(e) => Some(&e.request_id),
            Self::LoadFinished(e) => Some(&e.request_id),
            Self::LoadFailed(e) => Some(&e.request_id),
            Self::NavigationOccurred { .. } => None,
        }
    }

    /// Short event name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestStarted(_) => "request_started",
            Self::ResponseReceived(_) => "response_received",
            Self::LoadFinished(_) => "load_finished",
            Self::LoadFailed(_) => "load_failed",
            Self::NavigationOccurred { .. } => "navigation",
        }
    }
}

/// A request was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestStarted {
    pub request_id: String,
    pub timestamp: f64,
    pub url: String,
    pub method: String,
    /// DevTools resource type (`Document`, `Script`, `Image`, ...).
    pub resource_type: Option<String>,
    pub initiator: Option<Initiator>,
}

/// Response headers arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseReceived {
    pub request_id: String,
    pub timestamp: f64,
    pub status: u16,
    pub mime_type: Option<String>,
    /// Negotiated protocol, e.g. `h2` or `http/1.1`.
    pub protocol: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Bytes received so far at header time.
    pub encoded_data_length: f64,
    pub timing: Option<ResourceTiming>,
}

/// The body finished loading.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFinished {
    pub request_id: String,
    pub timestamp: f64,
    pub encoded_data_length: f64,
}

/// The request failed or was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailed {
    pub request_id: String,
    pub timestamp: f64,
    pub error_text: String,
}

/// DevTools `ResourceTiming`: millisecond offsets from a request-local base.
///
/// A negative mark means the phase did not happen (e.g. a reused connection
/// has no DNS or connect phase).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceTiming {
    pub dns_start: f64,
    pub dns_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub ssl_start: f64,
    pub ssl_end: f64,
    pub send_start: f64,
    pub send_end: f64,
    pub receive_headers_end: f64,
}

impl Default for ResourceTiming {
    fn default() -> Self {
        Self {
            dns_start: NOT_APPLICABLE,
            dns_end: NOT_APPLICABLE,
            connect_start: NOT_APPLICABLE,
            connect_end: NOT_APPLICABLE,
            ssl_start: NOT_APPLICABLE,
            ssl_end: NOT_APPLICABLE,
            send_start: NOT_APPLICABLE,
            send_end: NOT_APPLICABLE,
            receive_headers_end: NOT_APPLICABLE,
        }
    }
}
