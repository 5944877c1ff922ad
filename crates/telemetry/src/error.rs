//! Telemetry is best-effort: flush failures are logged, never surfaced as
//! an error the proxy hot path has to handle. This covers the one
//! fallible operation callers do need: constructing the flush client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid sidecar URL: {0}")]
    InvalidSidecarUrl(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
