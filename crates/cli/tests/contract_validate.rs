//! Exercises the same validation path as `acvps contract validate`
//! against a representative contract payload.

use acvps_contracts::{normalize_wire_json, Contract};

#[test]
fn validates_a_well_formed_contract_payload() {
    let raw = serde_json::json!({
        "contract_id": "hc-v1",
        "tenant_id": "acme",
        "status": "active",
        "thresholds": {"pii_risk": {"min": 0.0, "max": 0.2}},
        "issued_at": chrono::Utc::now(),
        "expires_at": chrono::Utc::now() + chrono::Duration::hours(1),
    });

    let normalized = normalize_wire_json(raw);
    let contract: Contract = serde_json::from_value(normalized).expect("contract should parse");
    contract.validate().expect("contract should be valid");
    assert!(!contract.recompute_policy_digest().is_empty());
}

#[test]
fn rejects_a_contract_missing_tenant_id() {
    let raw = serde_json::json!({
        "contract_id": "hc-v1",
        "tenant_id": "",
        "status": "active",
        "issued_at": chrono::Utc::now(),
        "expires_at": chrono::Utc::now() + chrono::Duration::hours(1),
    });

    let contract: Contract = serde_json::from_value(raw).unwrap();
    assert!(contract.validate().is_err());
}

#[test]
fn lifts_envelope_constraints_before_parsing() {
    let raw = serde_json::json!({
        "contract_id": "hc-v1",
        "tenant_id": "acme",
        "status": "active",
        "envelope": {"constraints": [{"metric": "pii_risk", "min": 0.0, "max": 0.2}]},
        "issued_at": chrono::Utc::now(),
        "expires_at": chrono::Utc::now() + chrono::Duration::hours(1),
    });

    let normalized = normalize_wire_json(raw);
    let contract: Contract = serde_json::from_value(normalized).expect("contract should parse");
    assert_eq!(contract.thresholds["pii_risk"].max, 0.2);
}
