//! Guardrail registry and evaluation.
//!
//! A guardrail is a pure function from a request/response payload to a
//! named metric: PII risk, grounding confidence, hallucination risk, or
//! any tenant-defined custom metric. Three kinds are supported: compiled
//! built-ins (registered once at process start), data-driven dynamic
//! guardrails evaluated by the generic LLM-template algorithm, and
//! native overrides that supersede either.

pub mod builtins;
pub mod config;
pub mod error;
pub mod registry;
pub mod stream;
pub mod template;

pub use builtins::{
    grounding_analyzer, hallucination_detector, pii_detector, GROUNDING_GUARDRAIL_ID,
    HALLUCINATION_GUARDRAIL_ID, PII_GUARDRAIL_ID,
};
pub use config::DynamicGuardrailConfig;
pub use error::{GuardrailError, Result};
pub use registry::{evaluate, BuiltinFn, GuardrailRegistry, Resolved};
pub use stream::{evaluate_stream, StreamContext, StreamDirection};
pub use template::{blocking_metrics, evaluate_template, extract_text, is_prompt_injection, sanitize};
