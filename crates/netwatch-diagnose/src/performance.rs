//! Slow and oversized requests.

use serde::Serialize;

use netwatch_types::{NetworkRecord, TimingPhases};

use crate::counts::{host_of, top_by};
use crate::thresholds::*;

/// A request flagged by one duration metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedRequest {
    pub url: String,
    pub status: Option<u16>,
    pub ms: f64,
}

/// A connection-phase metric, reported per host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostTiming {
    pub host: String,
    pub url: String,
    pub ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizedRequest {
    pub url: String,
    pub mime_type: Option<String>,
    pub transfer_size: u64,
    pub content_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub slow_requests: Vec<TimedRequest>,
    pub slow_ttfb: Vec<TimedRequest>,
    pub slow_dns: Vec<HostTiming>,
    pub slow_ssl: Vec<HostTiming>,
    pub large_payloads: Vec<SizedRequest>,
    pub large_images: Vec<SizedRequest>,
}

impl PerformanceReport {
    /// No slow requests, slow server waits, or large payloads.
    pub fn is_clean(&self) -> bool {
        self.slow_requests.is_empty() && self.slow_ttfb.is_empty() && self.large_payloads.is_empty()
    }
}

pub(crate) fn is_large_image(r: &NetworkRecord) -> bool {
    r.mime_type.as_deref().is_some_and(|m| m.starts_with("image/"))
        && r.transfer_size > LARGE_IMAGE_BYTES
}

fn timed(r: &NetworkRecord, ms: f64) -> TimedRequest {
    TimedRequest {
        url: r.url.clone(),
        status: r.status,
        ms,
    }
}

fn sized(r: &NetworkRecord) -> SizedRequest {
    SizedRequest {
        url: r.url.clone(),
        mime_type: r.mime_type.clone(),
        transfer_size: r.transfer_size,
        content_size: r.content_size,
    }
}

fn host_timings(
    records: &[NetworkRecord],
    pick: impl Fn(&TimingPhases) -> f64 + Copy,
    threshold: f64,
    limit: usize,
) -> Vec<HostTiming> {
    let flagged: Vec<HostTiming> = records
        .iter()
        .filter_map(|r| {
            let ms = r.phase(pick).filter(|&ms| ms > threshold)?;
            Some(HostTiming {
                host: host_of(&r.url),
                url: r.url.clone(),
                ms,
            })
        })
        .collect();
    top_by(flagged, |h| h.ms, limit)
}

pub fn analyze(records: &[NetworkRecord]) -> PerformanceReport {
    let slow_requests: Vec<TimedRequest> = records
        .iter()
        .filter(|r| r.time > SLOW_REQUEST_MS)
        .map(|r| timed(r, r.time))
        .collect();

    let slow_ttfb: Vec<TimedRequest> = records
        .iter()
        .filter_map(|r| {
            let wait = r.phase(|t| t.wait).filter(|&w| w > SLOW_TTFB_MS)?;
            Some(timed(r, wait))
        })
        .collect();

    let large_payloads: Vec<SizedRequest> = records
        .iter()
        .filter(|r| r.transfer_size > LARGE_PAYLOAD_BYTES)
        .map(sized)
        .collect();

    let large_images: Vec<SizedRequest> = records.iter().filter(|r| is_large_image(r)).map(sized).collect();

    PerformanceReport {
        slow_requests: top_by(slow_requests, |t| t.ms, TOP_SLOW_REQUESTS),
        slow_ttfb: top_by(slow_ttfb, |t| t.ms, TOP_SLOW_TTFB),
        slow_dns: host_timings(records, |t| t.dns, SLOW_DNS_MS, TOP_SLOW_DNS),
        slow_ssl: host_timings(records, |t| t.ssl, SLOW_SSL_MS, TOP_SLOW_SSL),
        large_payloads: top_by(large_payloads, |s| s.transfer_size as f64, TOP_LARGE_PAYLOADS),
        large_images: top_by(large_images, |s| s.transfer_size as f64, TOP_LARGE_IMAGES),
    }
}
