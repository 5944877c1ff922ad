//! Errors from the loader channels.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("cache backend error: {0}")]
    Cache(String),

    #[error("control-plane request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("contract error: {0}")]
    Contract(#[from] acvps_contracts::ContractError),

    #[error("malformed payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook rejected: {0}")]
    Webhook(String),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
