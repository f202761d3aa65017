//! Failed and erroring requests.

use serde::Serialize;

use netwatch_types::NetworkRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Transport failure, no HTTP response.
    Failed,
    ClientError,
    ServerError,
}

impl Severity {
    fn of(record: &NetworkRecord) -> Self {
        if record.error.is_some() {
            Severity::Failed
        } else if record.status.is_some_and(|s| s >= 500) {
            Severity::ServerError
        } else {
            Severity::ClientError
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedRequest {
    pub url: String,
    pub status: Option<u16>,
    pub severity: Severity,
    pub message: Option<String>,
}

/// Every record with a transport error or an HTTP status of 400 or more, in
/// log order.
pub fn analyze(records: &[NetworkRecord]) -> Vec<FailedRequest> {
    records
        .iter()
        .filter(|r| r.is_error())
        .map(|r| FailedRequest {
            url: r.url.clone(),
            status: r.status,
            severity: Severity::of(r),
            message: r.error.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::record;

    #[test]
    fn severity_per_kind() {
        let ok = record("https://x/ok");
        let mut missing = record("https://x/missing");
        missing.status = Some(404);
        let mut broken = record("https://x/broken");
        broken.status = Some(502);
        let mut reset = record("https://x/reset");
        reset.status = None;
        reset.error = Some("net::ERR_CONNECTION_RESET".into());

        let errors = analyze(&[ok, missing, broken, reset]);
        let got: Vec<_> = errors.iter().map(|e| (e.url.as_str(), e.severity)).collect();
        assert_eq!(
            got,
            vec![
                ("https://x/missing", Severity::ClientError),
                ("https://x/broken", Severity::ServerError),
                ("https://x/reset", Severity::Failed),
            ]
        );
        assert_eq!(errors[2].message.as_deref(), Some("net::ERR_CONNECTION_RESET"));
    }

    #[test]
    fn redirects_and_not_modified_are_fine() {
        let mut moved = record("https://x/moved");
        moved.status = Some(301);
        let mut same = record("https://x/same");
        same.status = Some(304);
        assert!(analyze(&[moved, same]).is_empty());
    }
}
