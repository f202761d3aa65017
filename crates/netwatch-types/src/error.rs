//! Error types shared across all netwatch crates.

/// Errors that can occur across the capture and diagnosis pipeline.
///
/// Each variant corresponds to a different subsystem: configuration, the
/// browser event source, snapshot persistence, or diagnostic input.
#[derive(Debug, thiserror::Error)]
pub enum NetwatchError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("event source error: {0}")]
    SourceError(String),

    #[error("persistence error: {0}")]
    PersistenceError(String),

    #[error("diagnostic input error: {0}")]
    InputError(String),

    /// The record set is empty. Not a failure; callers print a notice.
    #[error("no network data recorded")]
    NoData,
}
