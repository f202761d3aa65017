//! Event correlation: scattered lifecycle events in, one record out.
//!
//! Each request id moves through `RequestStarted -> ResponseReceived ->
//! LoadFinished | LoadFailed`. The correlator keeps one [`PendingRequest`]
//! per id until the terminal event arrives, then hands ownership of the
//! accumulated state to an immutable [`NetworkRecord`].
//!
//! Events for ids with no pending entry are dropped silently: the browser may
//! redeliver, and a navigation reset discards everything in flight.
//!
//! Not reentrant; feed it from a single task in delivery order.

use std::collections::HashMap;

use netwatch_types::{
    CacheHeaders, Initiator, LifecycleEvent, LoadFailed, LoadFinished, NetworkRecord,
    RequestStarted, ResponseReceived, TimingPhases, CACHE_HEADER_ALLOW_LIST,
};

use crate::timing::{normalize_timing, round_to};

/// Wall clock source in milliseconds since the Unix epoch.
pub type Clock = fn() -> i64;

fn wall_clock_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Partial state for a request that has not finished yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub url: String,
    pub method: String,
    pub resource_type: Option<String>,
    pub initiator: Option<Initiator>,
    /// Source-clock seconds of the `RequestStarted` event.
    pub started_at: f64,
    /// Milliseconds from the epoch base, two decimals.
    pub relative_start: f64,
    pub status: Option<u16>,
    pub mime_type: Option<String>,
    pub http_version: Option<String>,
    pub headers: CacheHeaders,
    pub timings: Option<TimingPhases>,
    /// Source-clock seconds of the `ResponseReceived` event.
    pub response_at: Option<f64>,
    pub content_size: u64,
}

/// Folds lifecycle events into normalized records for one navigation epoch
/// at a time.
#[derive(Debug)]
pub struct Correlator {
    pending: HashMap<String, PendingRequest>,
    /// Timestamp of the first request since the last reset.
    page_start: Option<f64>,
    clock: Clock,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::with_clock(wall_clock_ms)
    }

    /// Use a custom wall clock for the records' `timestamp` field.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            pending: HashMap::new(),
            page_start: None,
            clock,
        }
    }

    /// Apply one event. Returns a record when a request reaches a terminal
    /// state; navigation resets the epoch and returns `None`.
    pub fn on_event(&mut self, event: LifecycleEvent) -> Option<NetworkRecord> {
        match event {
            LifecycleEvent::RequestStarted(e) => {
                self.on_request_started(e);
                None
            }
            LifecycleEvent::ResponseReceived(e) => {
                self.on_response_received(e);
                None
            }
            LifecycleEvent::LoadFinished(e) => self.on_load_finished(e),
            LifecycleEvent::LoadFailed(e) => self.on_load_failed(e),
            LifecycleEvent::NavigationOccurred { .. } => {
                self.reset();
                None
            }
        }
    }

    /// Drop every in-flight request without emitting it and forget the time
    /// base. Both happen together so no request can straddle two epochs.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(dropped = self.pending.len(), "discarding in-flight requests");
        }
        self.pending.clear();
        self.page_start = None;
    }

    pub fn pending(&self, request_id: &str) -> Option<&PendingRequest> {
        self.pending.get(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The current epoch's base timestamp, if any request has started.
    pub fn page_start(&self) -> Option<f64> {
        self.page_start
    }

    fn on_request_started(&mut self, e: RequestStarted) {
        let base = *self.page_start.get_or_insert(e.timestamp);
        let entry = PendingRequest {
            url: e.url,
            method: e.method,
            resource_type: e.resource_type,
            initiator: e.initiator,
            started_at: e.timestamp,
            relative_start: relative_ms(e.timestamp, base),
            status: None,
            mime_type: None,
            http_version: None,
            headers: CacheHeaders::new(),
            timings: None,
            response_at: None,
            content_size: 0,
        };
        // A reused id replaces the earlier start.
        if self.pending.insert(e.request_id.clone(), entry).is_some() {
            tracing::debug!(request_id = %e.request_id, "request id restarted");
        }
    }

    fn on_response_received(&mut self, e: ResponseReceived) {
        let Some(p) = self.pending.get_mut(&e.request_id) else {
            return;
        };
        p.status = Some(e.status);
        p.mime_type = e.mime_type;
        p.http_version = Some(e.protocol.unwrap_or_else(|| "unknown".to_string()));
        p.headers = extract_cache_headers(&e.headers);
        p.timings = normalize_timing(e.timing.as_ref());
        p.response_at = Some(e.timestamp);
        p.content_size = byte_count(e.encoded_data_length);
    }

    fn on_load_finished(&mut self, e: LoadFinished) -> Option<NetworkRecord> {
        let mut p = self.pending.remove(&e.request_id)?;
        let transfer_size = byte_count(e.encoded_data_length);

        let mut time = 0.0;
        if let (Some(timings), Some(response_at)) = (p.timings.as_mut(), p.response_at) {
            timings.receive = round_to((e.timestamp - response_at) * 1000.0, 3);
            time = round_to((e.timestamp - p.started_at) * 1000.0, 3);
        }

        let base = self.page_start.unwrap_or(p.started_at);
        Some(NetworkRecord {
            url: p.url,
            method: p.method,
            resource_type: p.resource_type,
            status: p.status,
            time,
            transfer_size,
            content_size: p.content_size,
            mime_type: p.mime_type,
            http_version: p.http_version,
            timings: p.timings,
            headers: p.headers,
            cached: NetworkRecord::is_cached(transfer_size, p.status),
            relative_start: Some(p.relative_start),
            relative_end: Some(relative_ms(e.timestamp, base)),
            initiator: p.initiator,
            error: None,
            timestamp: (self.clock)(),
        })
    }

    fn on_load_failed(&mut self, e: LoadFailed) -> Option<NetworkRecord> {
        let p = self.pending.remove(&e.request_id)?;
        Some(NetworkRecord {
            url: p.url,
            method: p.method,
            resource_type: p.resource_type,
            status: None,
            time: 0.0,
            transfer_size: 0,
            content_size: 0,
            mime_type: None,
            http_version: None,
            timings: None,
            headers: CacheHeaders::new(),
            cached: false,
            relative_start: None,
            relative_end: None,
            initiator: p.initiator,
            error: Some(e.error_text),
            timestamp: (self.clock)(),
        })
    }
}

/// Keep only the allow-listed cache headers, keyed by lowercase name.
pub fn extract_cache_headers<'a>(
    headers: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> CacheHeaders {
    headers
        .into_iter()
        .filter_map(|(name, value)| {
            let lower = name.to_ascii_lowercase();
            CACHE_HEADER_ALLOW_LIST
                .contains(&lower.as_str())
                .then(|| (lower, value.clone()))
        })
        .collect()
}

fn relative_ms(timestamp: f64, base: f64) -> f64 {
    round_to((timestamp - base) * 1000.0, 2)
}

fn byte_count(length: f64) -> u64 {
    if length.is_finite() && length > 0.0 {
        length.round() as u64
    } else {
        0
    }
}
