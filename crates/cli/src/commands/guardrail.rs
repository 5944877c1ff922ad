//! `acvps guardrail` — list and register guardrails against a running gateway.

pub async fn list(gateway_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client.get(format!("{gateway_url}/discovery/guardrails")).send().await?;
    let status = response.status();
    let body: serde_json::Value = response.json().await?;

    if !status.is_success() {
        println!("discovery failed: {status}\n{body}");
        return Ok(());
    }

    if let Some(guardrails) = body.get("guardrails").and_then(|v| v.as_array()) {
        for entry in guardrails {
            let id = entry.get("id").and_then(|v| v.as_str()).unwrap_or("?");
            let kind = entry.get("kind").and_then(|v| v.as_str()).unwrap_or("?");
            let description = entry.get("description").and_then(|v| v.as_str()).unwrap_or("");
            println!("{id:32} [{kind:8}] {description}");
        }
    }
    Ok(())
}

pub async fn register(path: &str, gateway_url: &str, api_key: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;

    let client = reqwest::Client::new();
    let mut request = client.post(format!("{gateway_url}/api/guardrails/register")).json(&value);
    if let Some(key) = api_key {
        request = request.header("X-API-Key", key);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        println!("registered {path} against {gateway_url}: {status}");
    } else {
        println!("registration failed: {status}\n{body}");
    }
    Ok(())
}
