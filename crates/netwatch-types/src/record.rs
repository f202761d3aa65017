//! Normalized request records and raw tail entries.
//!
//! [`NetworkRecord`] is the persisted contract between capture and diagnosis:
//! the capture side writes a JSON array of them, the diagnose side reads it
//! back. Field names follow the HAR-like layout of the on-disk log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel for a timing phase that did not occur or is not yet known.
pub const NOT_APPLICABLE: f64 = -1.0;

/// Response headers retained on a record (compared case-insensitively).
pub const CACHE_HEADER_ALLOW_LIST: [&str; 4] = ["cache-control", "etag", "age", "cf-cache-status"];

/// Cache-related response headers, keyed by lowercase name.
pub type CacheHeaders = BTreeMap<String, String>;

/// What caused a request to be issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initiator {
    /// `parser`, `script`, `preflight`, `other`, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
}

/// HAR-style phase durations in milliseconds.
///
/// Each phase is either a non-negative duration or exactly
/// [`NOT_APPLICABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPhases {
    pub blocked: f64,
    pub dns: f64,
    pub connect: f64,
    pub ssl: f64,
    pub send: f64,
    pub wait: f64,
    pub receive: f64,
}

impl TimingPhases {
    /// Map a phase value to `None` when it is the not-applicable sentinel.
    pub fn known(value: f64) -> Option<f64> {
        (value >= 0.0).then_some(value)
    }
}

/// One finished request, immutable once emitted by the correlator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    pub url: String,
    pub method: String,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    /// Total duration in ms, zero when unknown.
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub transfer_size: u64,
    #[serde(default)]
    pub content_size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub http_version: Option<String>,
    #[serde(default)]
    pub timings: Option<TimingPhases>,
    #[serde(default)]
    pub headers: CacheHeaders,
    #[serde(default)]
    pub cached: bool,
    /// Milliseconds from the epoch's first request.
    #[serde(default)]
    pub relative_start: Option<f64>,
    #[serde(default)]
    pub relative_end: Option<f64>,
    #[serde(default)]
    pub initiator: Option<Initiator>,
    #[serde(default)]
    pub error: Option<String>,
    /// Wall clock capture time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl NetworkRecord {
    /// A record counts as cached when nothing was transferred or the server
    /// answered 304.
    pub fn is_cached(transfer_size: u64, status: Option<u16>) -> bool {
        transfer_size == 0 || status == Some(304)
    }

    /// True for transport failures and HTTP 4xx/5xx responses.
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.status.is_some_and(|s| s >= 400)
    }

    /// URL with everything from the first `?` removed.
    pub fn url_without_query(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.headers.get("cache-control").map(String::as_str)
    }

    pub fn cdn_cache_status(&self) -> Option<&str> {
        self.headers.get("cf-cache-status").map(String::as_str)
    }

    /// Whether the response was served over HTTP/1.1 (any casing).
    pub fn is_http1(&self) -> bool {
        self.http_version
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("http/1.1"))
    }

    /// The phase table, if the browser reported one.
    pub fn phase(&self, pick: impl Fn(&TimingPhases) -> f64) -> Option<f64> {
        self.timings.as_ref().and_then(|t| TimingPhases::known(pick(t)))
    }
}

/// Lightweight live-tail entry, one per started request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    /// Wall clock milliseconds when the request started.
    pub time: i64,
    pub request_id: String,
    pub method: String,
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    pub relative_start: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mime_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str) -> NetworkRecord {
        NetworkRecord {
            url: url.to_string(),
            method: "GET".into(),
            resource_type: Some("Script".into()),
            status: Some(200),
            time: 12.5,
            transfer_size: 100,
            content_size: 300,
            mime_type: Some("text/javascript".into()),
            http_version: Some("h2".into()),
            timings: None,
            headers: CacheHeaders::new(),
            cached: false,
            relative_start: Some(0.0),
            relative_end: Some(12.5),
            initiator: None,
            error: None,
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn cached_rule() {
        assert!(NetworkRecord::is_cached(0, Some(200)));
        assert!(NetworkRecord::is_cached(512, Some(304)));
        assert!(!NetworkRecord::is_cached(512, Some(200)));
        assert!(NetworkRecord::is_cached(0, None));
    }

    #[test]
    fn error_classification() {
        let mut r = record("https://x/a");
        assert!(!r.is_error());
        r.status = Some(404);
        assert!(r.is_error());
        r.status = None;
        r.error = Some("net::ERR_FAILED".into());
        assert!(r.is_error());
    }

    #[test]
    fn query_is_stripped() {
        assert_eq!(record("https://x/a?x=1&y=2").url_without_query(), "https://x/a");
        assert_eq!(record("https://x/a").url_without_query(), "https://x/a");
    }

    #[test]
    fn http1_detection_ignores_case() {
        let mut r = record("https://x/a");
        r.http_version = Some("HTTP/1.1".into());
        assert!(r.is_http1());
        r.http_version = Some("h2".into());
        assert!(!r.is_http1());
    }

    #[test]
    fn serializes_with_log_field_names() {
        let json = serde_json::to_value(record("https://x/a")).unwrap();
        assert_eq!(json["type"], "Script");
        assert_eq!(json["transferSize"], 100);
        assert_eq!(json["relativeStart"], 0.0);
        assert_eq!(json["httpVersion"], "h2");
        assert!(json["error"].is_null());
    }

    #[test]
    fn deserializes_failed_entry_without_relative_times() {
        let json = r#"{
            "url": "https://x/missing.js",
            "method": "GET",
            "type": "Script",
            "status": 0,
            "error": "net::ERR_NAME_NOT_RESOLVED",
            "time": 0,
            "transferSize": 0,
            "contentSize": 0,
            "mimeType": null,
            "httpVersion": null,
            "timings": null,
            "headers": {},
            "cached": false,
            "timestamp": 1700000000000
        }"#;
        let r: NetworkRecord = serde_json::from_str(json).unwrap();
        assert!(r.relative_start.is_none());
        assert!(r.is_error());
        assert!(r.timings.is_none());
    }

    #[test]
    fn phase_lookup_hides_sentinel() {
        let mut r = record("https://x/a");
        assert_eq!(r.phase(|t| t.wait), None);
        r.timings = Some(TimingPhases {
            blocked: NOT_APPLICABLE,
            dns: 4.0,
            connect: NOT_APPLICABLE,
            ssl: NOT_APPLICABLE,
            send: 0.5,
            wait: 600.0,
            receive: 3.0,
        });
        assert_eq!(r.phase(|t| t.wait), Some(600.0));
        assert_eq!(r.phase(|t| t.blocked), None);
    }

    #[test]
    fn raw_entry_omits_unknown_status() {
        let entry = RawEntry {
            time: 1,
            request_id: "1.1".into(),
            method: "GET".into(),
            url: "https://x/".into(),
            resource_type: Some("Document".into()),
            relative_start: 0.0,
            status: None,
            mime_type: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["requestId"], "1.1");
    }
}
