//! Diagnostic engine for recorded network activity.
//!
//! Loads the normalized record log written by the recorder and runs six
//! independent, stateless passes over it (summary, performance, caching,
//! errors, waterfall, recommendations). The resulting [`DiagnosisReport`]
//! serializes to JSON or renders as plain text.
//!
//! Every threshold lives in [`thresholds`] as a named constant.

pub mod caching;
pub mod counts;
pub mod failures;
pub mod loader;
pub mod performance;
pub mod recommendations;
pub mod render;
pub mod report;
pub mod summary;
pub mod thresholds;
pub mod waterfall;

pub use caching::CachingReport;
pub use counts::CountEntry;
pub use failures::{FailedRequest, Severity};
pub use loader::{load_records, parse_records};
pub use performance::PerformanceReport;
pub use render::{format_bytes, format_ms, truncate_url};
pub use report::{analyze, DiagnosisReport};
pub use summary::Summary;
pub use waterfall::WaterfallReport;
