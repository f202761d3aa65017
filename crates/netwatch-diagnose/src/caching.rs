//! Cache header hygiene, CDN hit rates, and duplicate fetches.

use serde::Serialize;

use netwatch_types::NetworkRecord;

use crate::counts::{rank_counts, CountEntry};
use crate::thresholds::{DUPLICATE_MIN_COUNT, STATIC_ASSET_TYPES};

/// A static asset served without usable cache headers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncachedAsset {
    pub url: String,
    pub resource_type: String,
    pub cache_control: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CachingReport {
    pub missing_cache_headers: Vec<UncachedAsset>,
    /// `cf-cache-status` histogram.
    pub cdn_status: Vec<CountEntry>,
    /// Query-stripped URLs fetched at least [`DUPLICATE_MIN_COUNT`] times.
    pub duplicates: Vec<CountEntry>,
}

impl CachingReport {
    pub fn is_healthy(&self) -> bool {
        self.missing_cache_headers.is_empty() && self.duplicates.is_empty()
    }
}

pub(crate) fn is_static_asset(r: &NetworkRecord) -> bool {
    r.resource_type
        .as_deref()
        .is_some_and(|t| STATIC_ASSET_TYPES.contains(&t))
}

fn lacks_cache_headers(r: &NetworkRecord) -> bool {
    match r.cache_control() {
        None => true,
        Some(cc) => cc.contains("no-cache") || cc.contains("no-store"),
    }
}

/// Occurrences per query-stripped URL, most fetched first.
pub(crate) fn url_counts(records: &[NetworkRecord]) -> Vec<CountEntry> {
    rank_counts(records.iter().map(NetworkRecord::url_without_query))
}

pub fn analyze(records: &[NetworkRecord]) -> CachingReport {
    let missing_cache_headers = records
        .iter()
        .filter(|r| is_static_asset(r) && !r.cached && lacks_cache_headers(r))
        .map(|r| UncachedAsset {
            url: r.url.clone(),
            resource_type: r.resource_type.clone().unwrap_or_default(),
            cache_control: r.cache_control().map(str::to_string),
        })
        .collect();

    let duplicates = url_counts(records)
        .into_iter()
        .filter(|c| c.count >= DUPLICATE_MIN_COUNT)
        .collect();

    CachingReport {
        missing_cache_headers,
        cdn_status: rank_counts(records.iter().filter_map(NetworkRecord::cdn_cache_status)),
        duplicates,
    }
}
