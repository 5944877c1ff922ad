//! Errors from the contract subsystem.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("invalid contract '{contract_id}': {reason}")]
    InvalidContract { contract_id: String, reason: String },

    #[error("malformed contract JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("contract key '{0}' matches neither wire form")]
    InvalidKey(String),

    #[error("contract '{0}' is not enforceable (wrong status or expired)")]
    NotEnforceable(String),

    #[error("contract '{0}' is already bound; unload it before reloading")]
    AlreadyBound(String),

    #[error("no binding loaded for key '{0}'")]
    NotLoaded(String),
}

pub type Result<T> = std::result::Result<T, ContractError>;
