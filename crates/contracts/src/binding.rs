//! The runtime binding table: contracts composed with the guardrails
//! their thresholds require, indexed by tenant-scoped key.

use std::collections::HashMap;
use std::sync::RwLock;

use acvps_core::key::TenantScopeKey;
use acvps_guardrails::{GuardrailRegistry, Resolved};
use chrono::{DateTime, Utc};

use crate::error::{ContractError, Result};
use crate::model::Contract;

/// The composition a request validator needs: the contract, the ids of
/// every guardrail required to produce its thresholds' metrics (computed
/// once at load time), and when the binding was built.
#[derive(Debug, Clone)]
pub struct RuntimeBinding {
    pub contract: Contract,
    pub guardrail_ids: Vec<String>,
    pub loaded_at: DateTime<Utc>,
}

impl RuntimeBinding {
    /// A contract with no thresholds and no declared guardrails passes
    /// through validation unconditionally.
    pub fn is_pass_through(&self) -> bool {
        self.guardrail_ids.is_empty()
    }
}

pub struct RuntimeBindingTable {
    bindings: RwLock<HashMap<TenantScopeKey, RuntimeBinding>>,
}

impl RuntimeBindingTable {
    pub fn new() -> Self {
        Self { bindings: RwLock::new(HashMap::new()) }
    }

    /// Idempotent: if `key` is already bound, returns success without
    /// touching the existing binding. Reload requires an explicit
    /// [`Self::unload`] first.
    pub fn load(&self, key: TenantScopeKey, contract: Contract, registry: &GuardrailRegistry) -> Result<()> {
        if self.bindings.read().expect("binding table lock poisoned").contains_key(&key) {
            return Ok(());
        }

        if !contract.is_enforceable(Utc::now()) {
            return Err(ContractError::NotEnforceable(contract.contract_id.clone()));
        }

        let guardrail_ids = if contract.thresholds.is_empty() && contract.guardrails.is_empty() {
            Vec::new()
        } else {
            resolve_guardrail_ids(&contract, registry)
        };

        let binding = RuntimeBinding { contract, guardrail_ids, loaded_at: Utc::now() };
        self.bindings.write().expect("binding table lock poisoned").insert(key, binding);
        Ok(())
    }

    pub fn get(&self, key: &TenantScopeKey) -> Option<RuntimeBinding> {
        self.bindings.read().expect("binding table lock poisoned").get(key).cloned()
    }

    pub fn unload(&self, key: &TenantScopeKey) -> bool {
        self.bindings.write().expect("binding table lock poisoned").remove(key).is_some()
    }

    pub fn list(&self) -> Vec<TenantScopeKey> {
        self.bindings.read().expect("binding table lock poisoned").keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().expect("binding table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RuntimeBindingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// For every metric referenced by a threshold, find the guardrail that
/// produces it: first among the contract's explicitly declared
/// guardrails, then the metric name itself as a guardrail id, then that
/// name with a `_v1` suffix. Missing guardrails are skipped with a
/// warning rather than failing the load.
fn resolve_guardrail_ids(contract: &Contract, registry: &GuardrailRegistry) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();

    for spec in &contract.guardrails {
        if registry.resolve(&spec.id).is_ok() {
            ids.push(spec.id.clone());
        } else {
            tracing::warn!(contract = %contract.contract_id, guardrail = %spec.id, "declared guardrail not registered");
        }
    }

    for metric in contract.thresholds.keys() {
        let already_covered = ids.iter().any(|id| produces_metric(registry, id, metric));
        if already_covered {
            continue;
        }

        if registry.resolve(metric).is_ok() {
            ids.push(metric.clone());
            continue;
        }

        let versioned = format!("{metric}_v1");
        if registry.resolve(&versioned).is_ok() {
            ids.push(versioned);
            continue;
        }

        tracing::warn!(contract = %contract.contract_id, metric = %metric, "no guardrail produces this metric");
    }

    ids.sort();
    ids.dedup();
    ids
}

fn produces_metric(registry: &GuardrailRegistry, id: &str, metric: &str) -> bool {
    match registry.resolve(id) {
        Ok(Resolved::Compiled { metadata, .. }) => metadata.produced_metrics.iter().any(|m| m == metric),
        Ok(Resolved::Dynamic(config)) => config.metric_name == metric,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acvps_core::{Bounds, FailoverProfile, Suite};
    use acvps_guardrails::PII_GUARDRAIL_ID;

    fn contract_with_threshold(metric: &str) -> Contract {
        let mut thresholds = acvps_core::ThresholdSet::new();
        thresholds.insert(metric.to_string(), Bounds::new(0.0, 0.5));
        Contract {
            contract_id: "hc-v1".into(),
            tenant_id: "acme".into(),
            version: "1".into(),
            status: crate::model::ContractStatus::Active,
            guardrails: vec![],
            thresholds,
            failover_profile: FailoverProfile::Strict,
            suite: Suite::S0,
            backend_url: None,
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            policy_digest: String::new(),
        }
    }

    #[test]
    fn load_is_idempotent() {
        let table = RuntimeBindingTable::new();
        let registry = GuardrailRegistry::with_builtins();
        let key = TenantScopeKey::new("acme", "hc-v1");

        table.load(key.clone(), contract_with_threshold("pii_risk"), &registry).unwrap();
        assert_eq!(table.len(), 1);

        table.load(key.clone(), contract_with_threshold("grounding_confidence"), &registry).unwrap();
        assert_eq!(table.len(), 1);
        let binding = table.get(&key).unwrap();
        assert!(binding.guardrail_ids.contains(&PII_GUARDRAIL_ID.to_string()));
    }

    #[test]
    fn pass_through_for_no_thresholds_and_no_guardrails() {
        let table = RuntimeBindingTable::new();
        let registry = GuardrailRegistry::with_builtins();
        let key = TenantScopeKey::new("acme", "pt");
        let mut contract = contract_with_threshold("pii_risk");
        contract.thresholds.clear();
        table.load(key.clone(), contract, &registry).unwrap();
        assert!(table.get(&key).unwrap().is_pass_through());
    }

    #[test]
    fn resolves_builtin_guardrail_by_metric_name() {
        let table = RuntimeBindingTable::new();
        let registry = GuardrailRegistry::with_builtins();
        let key = TenantScopeKey::new("acme", "hc-v1");
        table.load(key.clone(), contract_with_threshold("pii_risk"), &registry).unwrap();
        let binding = table.get(&key).unwrap();
        assert_eq!(binding.guardrail_ids, vec![PII_GUARDRAIL_ID.to_string()]);
    }

    #[test]
    fn unenforceable_contract_is_rejected() {
        let table = RuntimeBindingTable::new();
        let registry = GuardrailRegistry::with_builtins();
        let key = TenantScopeKey::new("acme", "revoked");
        let mut contract = contract_with_threshold("pii_risk");
        contract.status = crate::model::ContractStatus::Revoked;
        assert!(table.load(key, contract, &registry).is_err());
    }

    #[test]
    fn unload_allows_reload() {
        let table = RuntimeBindingTable::new();
        let registry = GuardrailRegistry::with_builtins();
        let key = TenantScopeKey::new("acme", "hc-v1");
        table.load(key.clone(), contract_with_threshold("pii_risk"), &registry).unwrap();
        assert!(table.unload(&key));
        assert!(table.is_empty());
        table.load(key.clone(), contract_with_threshold("grounding_confidence"), &registry).unwrap();
        assert!(table.get(&key).unwrap().guardrail_ids.iter().any(|id| id == "grounding_confidence"));
    }
}
