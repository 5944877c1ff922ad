//! Chat-completion client used to evaluate LLM-template guardrails.
//!
//! `acvps-guardrails` calls into this crate whenever a guardrail's
//! evaluation strategy is an LLM template rather than a native
//! detector; this crate has no knowledge of guardrails, contracts, or
//! metrics — it only speaks the OpenAI chat-completion wire format.

pub mod client;
pub mod error;

pub use client::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse, LlmClient};
pub use error::{LlmError, Result};
