//! HAR-style timing breakdown.
//!
//! Converts a DevTools `ResourceTiming` (millisecond marks relative to the
//! request's own base) into the seven HAR phases. A phase whose marks are
//! negative did not happen and is reported as [`NOT_APPLICABLE`].

use netwatch_types::{ResourceTiming, TimingPhases, NOT_APPLICABLE};

/// Build the phase table for a response.
///
/// Returns `None` when the browser supplied no timing at all, which is
/// different from a table of zero-length phases. `receive` is always
/// [`NOT_APPLICABLE`] here; it is filled in once loading finishes.
pub fn normalize_timing(timing: Option<&ResourceTiming>) -> Option<TimingPhases> {
    let t = timing?;
    let blocked = if t.dns_start > 0.0 {
        span(0.0, t.dns_start)
    } else {
        NOT_APPLICABLE
    };
    Some(TimingPhases {
        blocked,
        dns: span(t.dns_start, t.dns_end),
        connect: span(t.connect_start, t.connect_end),
        ssl: span(t.ssl_start, t.ssl_end),
        send: span(t.send_start, t.send_end),
        wait: span(t.send_end, t.receive_headers_end),
        receive: NOT_APPLICABLE,
    })
}

/// Duration between two marks, or the sentinel if either mark is missing.
fn span(start: f64, end: f64) -> f64 {
    if start < 0.0 || end < 0.0 {
        return NOT_APPLICABLE;
    }
    round_to(end - start, 3)
}

/// Round half away from zero to `places` decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
