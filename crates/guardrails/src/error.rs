//! Error type for guardrail registration and evaluation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardrailError {
    #[error("guardrail '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("guardrail '{0}' is not registered")]
    NotFound(String),

    #[error("guardrail '{0}' cannot be overwritten in place — unregister it first")]
    OverwriteRequiresUnregister(String),

    #[error("LLM evaluation error: {0}")]
    Llm(#[from] acvps_llm::LlmError),

    #[error("malformed guardrail config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, GuardrailError>;
