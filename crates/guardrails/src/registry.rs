//! The guardrail registry: built-ins, data-driven dynamic guardrails,
//! and native overrides, resolved in that priority order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use acvps_core::guardrail::{source_hash, GuardrailMetadata};
use acvps_core::metric::MetricMap;
use acvps_llm::LlmClient;

use crate::builtins::{
    grounding_analyzer, hallucination_detector, pii_detector, GROUNDING_GUARDRAIL_ID,
    HALLUCINATION_GUARDRAIL_ID, PII_GUARDRAIL_ID,
};
use crate::config::DynamicGuardrailConfig;
use crate::error::{GuardrailError, Result};
use crate::template::evaluate_template;

/// A compiled guardrail function: pure, synchronous, no network access.
pub type BuiltinFn = Arc<dyn Fn(&serde_json::Value) -> MetricMap + Send + Sync>;

#[derive(Clone)]
struct Registered {
    func: BuiltinFn,
    metadata: GuardrailMetadata,
}

/// The result of resolving a guardrail id, ready to be evaluated.
pub enum Resolved {
    Compiled { func: BuiltinFn, metadata: GuardrailMetadata },
    Dynamic(DynamicGuardrailConfig),
}

pub struct GuardrailRegistry {
    builtins: RwLock<HashMap<String, Registered>>,
    natives: RwLock<HashMap<String, Registered>>,
    dynamics: RwLock<HashMap<String, DynamicGuardrailConfig>>,
}

impl GuardrailRegistry {
    pub fn new() -> Self {
        Self {
            builtins: RwLock::new(HashMap::new()),
            natives: RwLock::new(HashMap::new()),
            dynamics: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the three required built-in guardrails already
    /// registered.
    pub fn with_builtins() -> Self {
        let registry = Self::new();

        registry
            .register_builtin(
                PII_GUARDRAIL_ID,
                Arc::new(pii_detector),
                metadata_for(PII_GUARDRAIL_ID, "detects SSNs, emails, phones, credit cards, and ZIP codes", &["pii_risk"]),
            )
            .expect("builtin registration at boot cannot fail");

        registry
            .register_builtin(
                GROUNDING_GUARDRAIL_ID,
                Arc::new(grounding_analyzer),
                metadata_for(GROUNDING_GUARDRAIL_ID, "scores citation density against sentence count", &["grounding_confidence"]),
            )
            .expect("builtin registration at boot cannot fail");

        registry
            .register_builtin(
                HALLUCINATION_GUARDRAIL_ID,
                Arc::new(hallucination_detector),
                metadata_for(HALLUCINATION_GUARDRAIL_ID, "scores vague vs. specific language markers", &["hallucination_risk"]),
            )
            .expect("builtin registration at boot cannot fail");

        registry
    }

    pub fn register_builtin(&self, id: impl Into<String>, func: BuiltinFn, metadata: GuardrailMetadata) -> Result<()> {
        let id = id.into();
        let mut builtins = self.builtins.write().expect("guardrail registry lock poisoned");
        if builtins.contains_key(&id) {
            return Err(GuardrailError::AlreadyRegistered(id));
        }
        builtins.insert(id, Registered { func, metadata });
        Ok(())
    }

    pub fn register_dynamic(&self, config: DynamicGuardrailConfig) -> Result<()> {
        let mut dynamics = self.dynamics.write().expect("guardrail registry lock poisoned");
        if dynamics.contains_key(&config.id) {
            return Err(GuardrailError::AlreadyRegistered(config.id));
        }
        dynamics.insert(config.id.clone(), config);
        Ok(())
    }

    pub fn register_native_override(&self, id: impl Into<String>, func: BuiltinFn, metadata: GuardrailMetadata) -> Result<()> {
        let id = id.into();
        let mut natives = self.natives.write().expect("guardrail registry lock poisoned");
        natives.insert(id, Registered { func, metadata });
        Ok(())
    }

    /// Lookup order: native override, then dynamic config, then
    /// built-in. A miss is an error.
    pub fn resolve(&self, id: &str) -> Result<Resolved> {
        if let Some(registered) = self.natives.read().expect("guardrail registry lock poisoned").get(id) {
            return Ok(Resolved::Compiled { func: registered.func.clone(), metadata: registered.metadata.clone() });
        }
        if let Some(config) = self.dynamics.read().expect("guardrail registry lock poisoned").get(id) {
            return Ok(Resolved::Dynamic(config.clone()));
        }
        if let Some(registered) = self.builtins.read().expect("guardrail registry lock poisoned").get(id) {
            return Ok(Resolved::Compiled { func: registered.func.clone(), metadata: registered.metadata.clone() });
        }
        Err(GuardrailError::NotFound(id.to_string()))
    }

    pub fn unregister_dynamic(&self, id: &str) -> Result<()> {
        let mut dynamics = self.dynamics.write().expect("guardrail registry lock poisoned");
        if dynamics.remove(id).is_none() {
            return Err(GuardrailError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.builtins.read().expect("guardrail registry lock poisoned").keys().cloned().collect();
        ids.extend(self.dynamics.read().expect("guardrail registry lock poisoned").keys().cloned());
        ids.extend(self.natives.read().expect("guardrail registry lock poisoned").keys().cloned());
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn list_configs(&self) -> Vec<DynamicGuardrailConfig> {
        self.dynamics.read().expect("guardrail registry lock poisoned").values().cloned().collect()
    }

    pub fn get_config(&self, id: &str) -> Option<DynamicGuardrailConfig> {
        self.dynamics.read().expect("guardrail registry lock poisoned").get(id).cloned()
    }
}

impl Default for GuardrailRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn metadata_for(id: &str, description: &str, produced_metrics: &[&str]) -> GuardrailMetadata {
    GuardrailMetadata {
        id: id.to_string(),
        version: "1".to_string(),
        source_hash: source_hash(description),
        description: description.to_string(),
        produced_metrics: produced_metrics.iter().map(|s| s.to_string()).collect(),
    }
}

/// Evaluate a registered guardrail by id against `payload`. `llm` and
/// `llm_model` are only consulted for dynamic (LLM-template) guardrails.
pub async fn evaluate(
    registry: &GuardrailRegistry,
    id: &str,
    payload: &serde_json::Value,
    llm: Option<&LlmClient>,
    llm_model: &str,
) -> Result<MetricMap> {
    match registry.resolve(id)? {
        Resolved::Compiled { func, .. } => Ok(func(payload)),
        Resolved::Dynamic(config) => Ok(evaluate_template(payload, &config, llm, llm_model).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_builtins_registers_all_three() {
        let registry = GuardrailRegistry::with_builtins();
        let ids = registry.list();
        assert!(ids.contains(&PII_GUARDRAIL_ID.to_string()));
        assert!(ids.contains(&GROUNDING_GUARDRAIL_ID.to_string()));
        assert!(ids.contains(&HALLUCINATION_GUARDRAIL_ID.to_string()));
    }

    #[test]
    fn duplicate_builtin_registration_is_an_error() {
        let registry = GuardrailRegistry::with_builtins();
        let result = registry.register_builtin(
            PII_GUARDRAIL_ID,
            Arc::new(pii_detector),
            metadata_for(PII_GUARDRAIL_ID, "dup", &["pii_risk"]),
        );
        assert!(matches!(result, Err(GuardrailError::AlreadyRegistered(_))));
    }

    #[test]
    fn native_override_takes_priority_over_builtin() {
        let registry = GuardrailRegistry::with_builtins();
        let overridden: BuiltinFn = Arc::new(|_payload| {
            let mut metrics = MetricMap::new();
            metrics.insert("pii_risk".into(), 0.0);
            metrics
        });
        registry
            .register_native_override(PII_GUARDRAIL_ID, overridden, metadata_for(PII_GUARDRAIL_ID, "override", &["pii_risk"]))
            .unwrap();

        let resolved = registry.resolve(PII_GUARDRAIL_ID).unwrap();
        match resolved {
            Resolved::Compiled { metadata, .. } => assert_eq!(metadata.description, "override"),
            Resolved::Dynamic(_) => panic!("expected compiled resolution"),
        }
    }

    #[test]
    fn unregister_dynamic_removes_entry() {
        let registry = GuardrailRegistry::new();
        let config = DynamicGuardrailConfig::new("custom.one", "desc", "custom_metric");
        registry.register_dynamic(config).unwrap();
        assert!(registry.get_config("custom.one").is_some());
        registry.unregister_dynamic("custom.one").unwrap();
        assert!(registry.get_config("custom.one").is_none());
        assert!(matches!(registry.unregister_dynamic("custom.one"), Err(GuardrailError::NotFound(_))));
    }

    #[tokio::test]
    async fn evaluate_resolves_builtin() {
        let registry = GuardrailRegistry::with_builtins();
        let payload = serde_json::json!({"text": "my email is a@b.com"});
        let metrics = evaluate(&registry, PII_GUARDRAIL_ID, &payload, None, "unused").await.unwrap();
        assert!(metrics["pii_risk"] > 0.0);
    }

    #[tokio::test]
    async fn evaluate_missing_guardrail_is_an_error() {
        let registry = GuardrailRegistry::new();
        let payload = serde_json::json!({});
        let result = evaluate(&registry, "nonexistent", &payload, None, "unused").await;
        assert!(matches!(result, Err(GuardrailError::NotFound(_))));
    }
}
