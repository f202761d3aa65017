//! Capture configuration.
//!
//! Defaults mirror the well-known locations used by the capture and diagnose
//! commands, so the two halves find each other without any flags.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::NetwatchError;

/// Environment variable selecting the DevTools port.
pub const PORT_ENV_VAR: &str = "CDP_PORT";

/// Default Chrome remote debugging port.
pub const DEFAULT_CDP_PORT: u16 = 9222;

/// Default path of the lightweight raw tail log.
pub const DEFAULT_RAW_LOG_PATH: &str = "/tmp/network-capture.json";

/// Default path of the normalized record log (the diagnose input).
pub const DEFAULT_METADATA_PATH: &str = "/tmp/network-metadata.json";

/// Coalescing window for snapshot writes.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(100);

/// Settings for one capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// DevTools HTTP/WebSocket port on localhost.
    pub port: u16,
    /// Where the raw tail log snapshot is written.
    pub raw_log_path: PathBuf,
    /// Where the normalized record snapshot is written.
    pub metadata_path: PathBuf,
    /// Delay after the last change before a snapshot is written.
    pub flush_delay: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CDP_PORT,
            raw_log_path: PathBuf::from(DEFAULT_RAW_LOG_PATH),
            metadata_path: PathBuf::from(DEFAULT_METADATA_PATH),
            flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }
}

impl CaptureConfig {
    /// Build a config from defaults, applying `CDP_PORT` if it is set.
    pub fn from_env() -> Result<Self, NetwatchError> {
        let port = std::env::var(PORT_ENV_VAR).ok();
        Self::with_port_override(port.as_deref())
    }

    /// Build a config from defaults with an optional textual port override.
    pub fn with_port_override(port: Option<&str>) -> Result<Self, NetwatchError> {
        let mut config = Self::default();
        if let Some(raw) = port {
            config.port = parse_port(raw)?;
        }
        Ok(config)
    }
}

/// Parse a port number, rejecting zero and non-numeric input.
pub fn parse_port(raw: &str) -> Result<u16, NetwatchError> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(NetwatchError::ConfigError(format!(
            "invalid {PORT_ENV_VAR} value '{raw}': expected a port between 1 and 65535"
        ))),
        Ok(port) => Ok(port),
    }
}
