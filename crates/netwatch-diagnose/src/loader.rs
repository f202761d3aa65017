//! Reads the normalized record log.

use std::path::Path;

use tracing::debug;

use netwatch_types::{NetwatchError, NetworkRecord};

/// Load every record from a snapshot file.
///
/// A missing, unreadable, or non-array file is an [`NetwatchError::InputError`]
/// carrying the underlying cause. An empty array loads as an empty vec; the
/// caller decides how to report that.
pub fn load_records(path: &Path) -> Result<Vec<NetworkRecord>, NetwatchError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        NetwatchError::InputError(format!("failed to read {}: {e}", path.display()))
    })?;
    let records = parse_records(&content).map_err(|e| match e {
        NetwatchError::InputError(msg) => {
            NetwatchError::InputError(format!("{}: {msg}", path.display()))
        }
        other => other,
    })?;
    debug!(path = %path.display(), records = records.len(), "loaded record log");
    Ok(records)
}

/// Parse a snapshot from its JSON text.
pub fn parse_records(json: &str) -> Result<Vec<NetworkRecord>, NetwatchError> {
    serde_json::from_str(json)
        .map_err(|e| NetwatchError::InputError(format!("invalid record log: {e}")))
}
