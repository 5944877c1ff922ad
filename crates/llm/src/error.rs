//! Error type for the guardrail-evaluation chat client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error calling LLM endpoint: {0}")]
    Network(String),

    #[error("LLM endpoint returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode LLM response: {0}")]
    Decode(String),

    #[error("no API key configured for provider {0}")]
    MissingApiKey(String),

    #[error("request to LLM endpoint timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, LlmError>;
