//! Fixed thresholds used by the analysis passes.
//!
//! These are contract values: reports and tests depend on them exactly.

/// A request taking longer than this in total is slow.
pub const SLOW_REQUEST_MS: f64 = 1000.0;
/// Server wait (time to first byte) above this is slow.
pub const SLOW_TTFB_MS: f64 = 500.0;
pub const SLOW_DNS_MS: f64 = 100.0;
pub const SLOW_SSL_MS: f64 = 200.0;
/// Time spent queued before DNS started.
pub const HIGH_BLOCKED_MS: f64 = 100.0;
pub const LARGE_PAYLOAD_BYTES: u64 = 500_000;
/// Applies to responses with an `image/` MIME type.
pub const LARGE_IMAGE_BYTES: u64 = 200_000;
/// Requests starting later than this after the first request were discovered late.
pub const LATE_DISCOVERY_MS: f64 = 2000.0;
/// A query-stripped URL fetched at least this many times is a duplicate.
pub const DUPLICATE_MIN_COUNT: usize = 2;

/// Resource types expected to carry long-lived cache headers.
pub const STATIC_ASSET_TYPES: [&str; 4] = ["Script", "Stylesheet", "Image", "Font"];

pub const TOP_SLOW_REQUESTS: usize = 10;
pub const TOP_LARGE_PAYLOADS: usize = 10;
pub const TOP_SLOW_TTFB: usize = 5;
pub const TOP_SLOW_DNS: usize = 5;
pub const TOP_SLOW_SSL: usize = 5;
pub const TOP_LARGE_IMAGES: usize = 5;
pub const TOP_LATE_DISCOVERIES: usize = 10;
pub const TOP_QUEUED: usize = 5;
pub const TOP_SCRIPT_INITIATORS: usize = 5;
pub const TOP_HTTP1_HOSTS: usize = 5;

/// Rows shown per list in the text rendering.
pub const TEXT_LIST_LIMIT: usize = 10;

// Recommendation triggers. "More than" unless noted.
pub const RECOMMEND_SLOW_REQUESTS: usize = 3;
pub const RECOMMEND_MISSING_CACHE: usize = 5;
/// At least this many fetches of one URL.
pub const RECOMMEND_DUPLICATE_COUNT: usize = 3;
/// Share of all requests served over HTTP/1.1.
pub const RECOMMEND_HTTP1_SHARE: f64 = 0.3;
pub const RECOMMEND_LATE_DISCOVERIES: usize = 5;
pub const RECOMMEND_HIGH_BLOCKED: usize = 3;
