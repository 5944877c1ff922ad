//! Errors from the validation engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("guardrail produced no value for required metric '{metric}'")]
    MissingMetric { metric: String },

    #[error("guardrail evaluation failed: {0}")]
    Guardrail(#[from] acvps_guardrails::GuardrailError),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
