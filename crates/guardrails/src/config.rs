//! Data-driven guardrail configuration for `register_dynamic`.

use acvps_core::Bounds;
use serde::{Deserialize, Serialize};

/// A guardrail defined entirely as data and evaluated by the generic
/// LLM-template algorithm (see [`crate::template::evaluate_template`])
/// rather than by a compiled function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicGuardrailConfig {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub prompt_template: Option<String>,
    pub metric_name: String,
    #[serde(default)]
    pub invert_score: bool,
    #[serde(default)]
    pub default_threshold: Option<Bounds>,
}

impl DynamicGuardrailConfig {
    pub fn new(id: impl Into<String>, description: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            keywords: Vec::new(),
            prompt_template: None,
            metric_name: metric_name.into(),
            invert_score: false,
            default_threshold: None,
        }
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert_score = true;
        self
    }
}
