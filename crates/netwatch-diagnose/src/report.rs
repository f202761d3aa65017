//! The combined diagnosis report.

use serde::Serialize;
use tracing::debug;

use netwatch_types::{NetwatchError, NetworkRecord};

use crate::caching::{self, CachingReport};
use crate::failures::{self, FailedRequest};
use crate::performance::{self, PerformanceReport};
use crate::recommendations;
use crate::summary::{self, Summary};
use crate::waterfall::{self, WaterfallReport};

/// Output of every analysis pass over one record set.
///
/// Contains no timestamps or other run-dependent values, so analyzing the
/// same log twice yields an identical report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosisReport {
    pub summary: Summary,
    pub performance: PerformanceReport,
    pub caching: CachingReport,
    pub errors: Vec<FailedRequest>,
    pub waterfall: WaterfallReport,
    pub recommendations: Vec<&'static str>,
}

/// Run all passes. An empty record set yields [`NetwatchError::NoData`].
pub fn analyze(records: &[NetworkRecord]) -> Result<DiagnosisReport, NetwatchError> {
    if records.is_empty() {
        return Err(NetwatchError::NoData);
    }

    let report = DiagnosisReport {
        summary: summary::summarize(records),
        performance: performance::analyze(records),
        caching: caching::analyze(records),
        errors: failures::analyze(records),
        waterfall: waterfall::analyze(records),
        recommendations: recommendations::recommend(records),
    };
    debug!(
        records = records.len(),
        errors = report.errors.len(),
        recommendations = report.recommendations.len(),
        "analysis complete"
    );
    Ok(report)
}
