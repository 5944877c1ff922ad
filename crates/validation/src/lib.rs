//! Validation engine: given a runtime binding and a payload, compute the
//! binding's composed guardrail metrics and check each against the
//! contract's thresholds.

pub mod error;

pub use error::{Result, ValidationError};

use std::time::Instant;

use acvps_contracts::RuntimeBinding;
use acvps_core::metric::{MetricMap, Violation};
use acvps_guardrails::GuardrailRegistry;
use acvps_llm::LlmClient;

/// p95 budget for the combined extraction+validation phases; exceeding
/// it is logged, not failed.
const VALIDATION_BUDGET_MS: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub metrics: MetricMap,
    pub violations: Vec<Violation>,
    pub extraction_ms: f64,
    pub validation_ms: f64,
}

/// Run the binding's composed guardrail against `payload`, then check
/// every threshold. Bounds are inclusive at both ends.
pub async fn validate(
    binding: &RuntimeBinding,
    payload: &serde_json::Value,
    registry: &GuardrailRegistry,
    llm: Option<&LlmClient>,
    llm_model: &str,
) -> Result<ValidationResult> {
    let extraction_start = Instant::now();
    let metrics = compute_metrics(binding, payload, registry, llm, llm_model).await?;
    let extraction_ms = extraction_start.elapsed().as_secs_f64() * 1000.0;

    if binding.contract.thresholds.is_empty() {
        return Ok(ValidationResult {
            valid: true,
            metrics,
            violations: Vec::new(),
            extraction_ms,
            validation_ms: 0.0,
        });
    }

    let validation_start = Instant::now();
    let mut violations = Vec::new();
    for (metric, bounds) in &binding.contract.thresholds {
        let value = metrics.get(metric).copied().ok_or_else(|| ValidationError::MissingMetric { metric: metric.clone() })?;
        if !bounds.contains(value) {
            violations.push(Violation::new(metric.clone(), value, *bounds));
        }
    }
    let validation_ms = validation_start.elapsed().as_secs_f64() * 1000.0;

    if extraction_ms + validation_ms > VALIDATION_BUDGET_MS {
        tracing::warn!(
            contract = %binding.contract.contract_id,
            extraction_ms,
            validation_ms,
            budget_ms = VALIDATION_BUDGET_MS,
            "validation exceeded its latency budget"
        );
    }

    Ok(ValidationResult { valid: violations.is_empty(), metrics, violations, extraction_ms, validation_ms })
}

/// Invoke every guardrail the binding requires and merge their metric
/// outputs. Collisions are last-writer-wins, same as composition at
/// load time.
async fn compute_metrics(
    binding: &RuntimeBinding,
    payload: &serde_json::Value,
    registry: &GuardrailRegistry,
    llm: Option<&LlmClient>,
    llm_model: &str,
) -> Result<MetricMap> {
    let mut metrics = MetricMap::new();
    if binding.is_pass_through() {
        return Ok(metrics);
    }

    for id in &binding.guardrail_ids {
        match acvps_guardrails::evaluate(registry, id, payload, llm, llm_model).await {
            Ok(produced) => metrics.extend(produced),
            Err(err) => {
                tracing::warn!(guardrail = %id, error = %err, "guardrail evaluation failed, metric omitted");
            }
        }
    }

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use acvps_contracts::{Contract, ContractStatus};
    use acvps_core::{Bounds, FailoverProfile, Suite, ThresholdSet};
    use acvps_guardrails::PII_GUARDRAIL_ID;
    use chrono::Utc;

    fn binding_with_pii_threshold(min: f64, max: f64) -> RuntimeBinding {
        let mut thresholds = ThresholdSet::new();
        thresholds.insert("pii_risk".into(), Bounds::new(min, max));
        let contract = Contract {
            contract_id: "hc-v1".into(),
            tenant_id: "acme".into(),
            version: "1".into(),
            status: ContractStatus::Active,
            guardrails: vec![],
            thresholds,
            failover_profile: FailoverProfile::Strict,
            suite: Suite::S0,
            backend_url: None,
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            policy_digest: String::new(),
        };
        RuntimeBinding { contract, guardrail_ids: vec![PII_GUARDRAIL_ID.to_string()], loaded_at: Utc::now() }
    }

    #[tokio::test]
    async fn passes_when_metric_in_bounds() {
        let binding = binding_with_pii_threshold(0.0, 1.0);
        let registry = GuardrailRegistry::with_builtins();
        let payload = serde_json::json!({"text": "nothing sensitive here"});
        let result = validate(&binding, &payload, &registry, None, "unused").await.unwrap();
        assert!(result.valid);
        assert!(result.violations.is_empty());
    }

    #[tokio::test]
    async fn fails_when_metric_out_of_bounds() {
        let binding = binding_with_pii_threshold(0.0, 0.0);
        let registry = GuardrailRegistry::with_builtins();
        let payload = serde_json::json!({"text": "email me at a@b.com, ssn 123-45-6789"});
        let result = validate(&binding, &payload, &registry, None, "unused").await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.violations[0].metric, "pii_risk");
    }

    #[tokio::test]
    async fn no_thresholds_passes_trivially() {
        let mut binding = binding_with_pii_threshold(0.0, 1.0);
        binding.contract.thresholds.clear();
        let registry = GuardrailRegistry::with_builtins();
        let payload = serde_json::json!({});
        let result = validate(&binding, &payload, &registry, None, "unused").await.unwrap();
        assert!(result.valid);
        assert_eq!(result.validation_ms, 0.0);
    }

    #[tokio::test]
    async fn pass_through_binding_produces_no_metrics() {
        let mut binding = binding_with_pii_threshold(0.0, 1.0);
        binding.guardrail_ids.clear();
        binding.contract.thresholds.clear();
        let registry = GuardrailRegistry::with_builtins();
        let payload = serde_json::json!({});
        let result = validate(&binding, &payload, &registry, None, "unused").await.unwrap();
        assert!(result.metrics.is_empty());
    }
}
