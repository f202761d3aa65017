//! Headline numbers for a capture.

use serde::Serialize;

use netwatch_types::NetworkRecord;

use crate::counts::{rank_counts, CountEntry};

/// Label for records without a resource type.
const UNTYPED: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_requests: usize,
    /// Bytes on the wire.
    pub total_transfer: u64,
    /// Decoded body bytes.
    pub total_content: u64,
    /// Latest `relativeEnd` of any record, in ms.
    pub page_load_time: f64,
    pub total_time: f64,
    pub average_time: f64,
    pub cached: usize,
    /// Percentage of cached records, rounded.
    pub cache_hit_rate: u32,
    /// Records with HTTP status >= 400 or a transport error.
    pub errors: usize,
    /// Records with a transport error.
    pub failed: usize,
    pub by_type: Vec<CountEntry>,
}

/// Summarize a non-empty record set.
pub fn summarize(records: &[NetworkRecord]) -> Summary {
    let total_requests = records.len();
    let total_time: f64 = records.iter().map(|r| r.time).sum();
    let cached = records.iter().filter(|r| r.cached).count();

    let page_load_time = records
        .iter()
        .filter_map(|r| r.relative_end)
        .filter(|&t| t > 0.0)
        .fold(0.0, f64::max);

    let (average_time, cache_hit_rate) = if total_requests == 0 {
        (0.0, 0)
    } else {
        let n = total_requests as f64;
        (total_time / n, (cached as f64 / n * 100.0).round() as u32)
    };

    Summary {
        total_requests,
        total_transfer: records.iter().map(|r| r.transfer_size).sum(),
        total_content: records.iter().map(|r| r.content_size).sum(),
        page_load_time,
        total_time,
        average_time,
        cached,
        cache_hit_rate,
        errors: records.iter().filter(|r| r.is_error()).count(),
        failed: records.iter().filter(|r| r.error.is_some()).count(),
        by_type: rank_counts(
            records
                .iter()
                .map(|r| r.resource_type.as_deref().unwrap_or(UNTYPED)),
        ),
    }
}
