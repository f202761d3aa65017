//! Core types shared across all netwatch crates.
//!
//! Defines the typed network lifecycle events consumed by the recorder, the
//! normalized request record persisted for later diagnosis, configuration,
//! and the shared error type.

pub mod config;
pub mod error;
pub mod event;
pub mod record;

pub use config::{
    CaptureConfig, DEFAULT_CDP_PORT, DEFAULT_FLUSH_DELAY, DEFAULT_METADATA_PATH,
    DEFAULT_RAW_LOG_PATH, PORT_ENV_VAR,
};
pub use error::NetwatchError;
pub use event::{
    LifecycleEvent, LoadFailed, LoadFinished, RequestStarted, ResourceTiming, ResponseReceived,
};
pub use record::{
    CacheHeaders, Initiator, NetworkRecord, RawEntry, TimingPhases, CACHE_HEADER_ALLOW_LIST,
    NOT_APPLICABLE,
};
