//! `acvps contract` — validate and push tenant policy contracts.

use acvps_contracts::{normalize_wire_json, Contract};

pub async fn validate(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let normalized = normalize_wire_json(value);
    let contract: Contract = serde_json::from_value(normalized)?;
    contract.validate()?;

    let digest = contract.recompute_policy_digest();
    println!("contract '{}' is well-formed", contract.contract_id);
    println!("  tenant:          {}", contract.tenant_id);
    println!("  status:          {:?}", contract.status);
    println!("  guardrails:      {}", contract.guardrails.len());
    println!("  thresholds:      {}", contract.thresholds.len());
    println!("  policy_digest:   {digest}");
    if digest != contract.policy_digest && !contract.policy_digest.is_empty() {
        println!("  warning: stored policy_digest does not match the recomputed digest");
    }
    Ok(())
}

pub async fn push(path: &str, gateway_url: &str, api_key: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;

    let client = reqwest::Client::new();
    let mut request = client.post(format!("{gateway_url}/api/contracts")).json(&value);
    if let Some(key) = api_key {
        request = request.header("X-API-Key", key);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        println!("pushed {path} to {gateway_url}: {status}");
    } else {
        println!("push failed: {status}\n{body}");
    }
    Ok(())
}
