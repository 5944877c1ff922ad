//! The contract data model: identity, policy, routing, and validity
//! window, plus the schema-normalization step loaders run on ingest.

use std::collections::HashMap;

use acvps_core::{Bounds, FailoverProfile, GuardrailSpec, Suite, ThresholdSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ContractError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Active,
    Approved,
    Revoked,
    Expired,
}

/// The enforcement unit: identity, policy, routing, and validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: String,
    pub tenant_id: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub status: ContractStatus,

    #[serde(default)]
    pub guardrails: Vec<GuardrailSpec>,
    #[serde(default, deserialize_with = "deserialize_thresholds")]
    pub thresholds: ThresholdSet,
    #[serde(default)]
    pub failover_profile: FailoverProfile,
    #[serde(default)]
    pub suite: Suite,

    #[serde(default)]
    pub backend_url: Option<String>,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub policy_digest: String,
}

fn default_version() -> String {
    "1".to_string()
}

impl Contract {
    /// Enforceable iff `status ∈ {active, approved}` and not expired.
    pub fn is_enforceable(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, ContractStatus::Active | ContractStatus::Approved) && now <= self.expires_at
    }

    /// SHA-256 of the canonical (sorted-key) JSON encoding of the policy
    /// fields: guardrails, thresholds, failover profile, and suite.
    pub fn recompute_policy_digest(&self) -> String {
        let mut thresholds: Vec<(&String, &Bounds)> = self.thresholds.iter().collect();
        thresholds.sort_by_key(|(name, _)| name.as_str());

        let canonical = serde_json::json!({
            "guardrails": self.guardrails,
            "thresholds": thresholds.into_iter().map(|(k, v)| (k.clone(), v)).collect::<HashMap<_, _>>(),
            "failover_profile": self.failover_profile,
            "suite": self.suite,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn validate(&self) -> Result<()> {
        if self.contract_id.trim().is_empty() {
            return Err(ContractError::InvalidContract {
                contract_id: self.contract_id.clone(),
                reason: "contract_id must not be empty".into(),
            });
        }
        if self.tenant_id.trim().is_empty() {
            return Err(ContractError::InvalidContract {
                contract_id: self.contract_id.clone(),
                reason: "tenant_id must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Thresholds may arrive either as a `{metric: {min, max}}` map or as a
/// list of `{metric, min, max}` records; normalize both to the map form.
fn deserialize_thresholds<'de, D>(deserializer: D) -> std::result::Result<ThresholdSet, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct ThresholdRecord {
        metric: String,
        min: f64,
        max: f64,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Map(HashMap<String, Bounds>),
        List(Vec<ThresholdRecord>),
    }

    Ok(match Wire::deserialize(deserializer)? {
        Wire::Map(map) => map,
        Wire::List(list) => list
            .into_iter()
            .map(|r| (r.metric, Bounds::new(r.min, r.max)))
            .collect(),
    })
}

/// Pre-deserialization schema normalization for wire payloads that carry
/// an `envelope.constraints` list instead of a top-level `thresholds`
/// field, and loaders that still emit `feature_extractors` (plural) but
/// expect readers to find the legacy singular `feature_extractor` key.
pub fn normalize_wire_json(mut raw: serde_json::Value) -> serde_json::Value {
    if let Some(constraints) = raw.get("envelope").and_then(|e| e.get("constraints")).cloned() {
        if raw.get("thresholds").is_none() {
            if let serde_json::Value::Object(obj) = &mut raw {
                obj.insert("thresholds".to_string(), constraints);
            }
        }
    }

    if let Some(first) = raw
        .get("feature_extractors")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .cloned()
    {
        if raw.get("feature_extractor").is_none() {
            if let serde_json::Value::Object(obj) = &mut raw {
                obj.insert("feature_extractor".to_string(), first);
            }
        }
    }

    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_contract() -> Contract {
        Contract {
            contract_id: "hc-v1".into(),
            tenant_id: "acme".into(),
            version: "1".into(),
            status: ContractStatus::Active,
            guardrails: vec![],
            thresholds: ThresholdSet::new(),
            failover_profile: FailoverProfile::Strict,
            suite: Suite::S0,
            backend_url: None,
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            policy_digest: String::new(),
        }
    }

    #[test]
    fn enforceable_requires_active_status_and_unexpired_window() {
        let mut contract = base_contract();
        assert!(contract.is_enforceable(Utc::now()));

        contract.status = ContractStatus::Revoked;
        assert!(!contract.is_enforceable(Utc::now()));

        contract.status = ContractStatus::Active;
        contract.expires_at = Utc::now() - chrono::Duration::hours(1);
        assert!(!contract.is_enforceable(Utc::now()));
    }

    #[test]
    fn policy_digest_is_stable_and_order_independent() {
        let mut a = base_contract();
        a.thresholds.insert("pii_risk".into(), Bounds::new(0.0, 0.2));
        a.thresholds.insert("grounding_confidence".into(), Bounds::new(0.5, 1.0));

        let mut b = base_contract();
        b.thresholds.insert("grounding_confidence".into(), Bounds::new(0.5, 1.0));
        b.thresholds.insert("pii_risk".into(), Bounds::new(0.0, 0.2));

        assert_eq!(a.recompute_policy_digest(), b.recompute_policy_digest());
    }

    #[test]
    fn thresholds_accept_map_form() {
        let raw = serde_json::json!({
            "contract_id": "hc-v1",
            "tenant_id": "acme",
            "status": "active",
            "thresholds": {"pii_risk": {"min": 0.0, "max": 0.2}},
            "issued_at": Utc::now(),
            "expires_at": Utc::now() + chrono::Duration::hours(1),
        });
        let contract: Contract = serde_json::from_value(raw).unwrap();
        assert_eq!(contract.thresholds["pii_risk"].max, 0.2);
    }

    #[test]
    fn thresholds_accept_list_form() {
        let raw = serde_json::json!({
            "contract_id": "hc-v1",
            "tenant_id": "acme",
            "status": "active",
            "thresholds": [{"metric": "pii_risk", "min": 0.0, "max": 0.2}],
            "issued_at": Utc::now(),
            "expires_at": Utc::now() + chrono::Duration::hours(1),
        });
        let contract: Contract = serde_json::from_value(raw).unwrap();
        assert_eq!(contract.thresholds["pii_risk"].max, 0.2);
    }

    #[test]
    fn normalize_wire_json_lifts_envelope_constraints() {
        let raw = serde_json::json!({
            "envelope": {"constraints": [{"metric": "pii_risk", "min": 0.0, "max": 0.2}]},
        });
        let normalized = normalize_wire_json(raw);
        assert!(normalized.get("thresholds").is_some());
    }

    #[test]
    fn normalize_wire_json_mirrors_feature_extractor() {
        let raw = serde_json::json!({"feature_extractors": ["tokenizer-v1"]});
        let normalized = normalize_wire_json(raw);
        assert_eq!(normalized["feature_extractor"], "tokenizer-v1");
    }
}
