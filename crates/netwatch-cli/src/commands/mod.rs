//! CLI command implementations for the `netwatch` binary.

pub mod capture;
pub mod diagnose;
