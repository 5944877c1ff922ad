//! Shared error type for the core domain types (metric/key parsing).
//!
//! Each subsystem crate (guardrails, contracts, loaders, telemetry, gateway)
//! defines its own `thiserror` error enum with `#[from]` conversions at its
//! boundaries; this type only covers the handful of fallible operations
//! that live in `acvps-core` itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid tenant scope key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
