//! HTTP client for the control plane: the periodic pull, the targeted
//! single-contract fetch, and the long-lived SSE event stream.

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;

use crate::error::{LoaderError, Result};
use crate::schema::{GatewayContractsResponse, GatewaySyncResponse};
use crate::sse::{SseDecoder, SseEvent};

pub struct ControlPlaneClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().expect("reqwest client builder with only timeout set cannot fail");
        Self { client, base_url: base_url.into(), api_key: api_key.into() }
    }

    /// `GET /api/gateway/contracts`: all contracts visible to this
    /// gateway's API key.
    pub async fn pull_contracts(&self) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/api/gateway/contracts", self.base_url);
        let response = self.client.get(&url).header("X-API-Key", &self.api_key).send().await?;
        let body: GatewayContractsResponse = response.json().await?;
        Ok(body.contracts)
    }

    /// `GET /api/gateway/sync`: the alternative `{contracts, guardrails}`
    /// schema. Guardrail configs are returned as raw JSON for the caller
    /// to hand to the multi-tenant guardrail sourcing module.
    pub async fn sync(&self) -> Result<GatewaySyncResponse> {
        let url = format!("{}/api/gateway/sync", self.base_url);
        let response = self.client.get(&url).header("X-API-Key", &self.api_key).send().await?;
        Ok(response.json().await?)
    }

    /// Fetch one contract by id, for the targeted loader used when an
    /// event names a specific `contract_id`/`tenant_id`.
    pub async fn pull_single(&self, tenant_id: &str, contract_id: &str) -> Result<serde_json::Value> {
        let url = format!("{}/api/gateway/contracts/{contract_id}", self.base_url);
        let response = self.client.get(&url).header("X-API-Key", &self.api_key).header("X-Tenant-ID", tenant_id).send().await?;
        if !response.status().is_success() {
            return Err(LoaderError::Webhook(format!("targeted fetch for {contract_id} failed: {}", response.status())));
        }
        Ok(response.json().await?)
    }

    /// `GET /api/certificates/{id}`: the signed binding a client presents
    /// in `X-Certificate-ID` instead of the plain tenant/contract headers.
    pub async fn get_certificate(&self, certificate_id: &str) -> Result<serde_json::Value> {
        let url = format!("{}/api/certificates/{certificate_id}", self.base_url);
        let response = self.client.get(&url).header("X-API-Key", &self.api_key).send().await?;
        if !response.status().is_success() {
            return Err(LoaderError::Webhook(format!("certificate lookup for {certificate_id} failed: {}", response.status())));
        }
        Ok(response.json().await?)
    }

    /// One-time exchange of a tenant key for a gateway key.
    pub async fn register(&self, tenant_key: &str) -> Result<String> {
        let url = format!("{}/api/gateway/register", self.base_url);
        let response =
            self.client.post(&url).json(&serde_json::json!({"tenant_key": tenant_key})).send().await?;
        let body: serde_json::Value = response.json().await?;
        body.get("gateway_key")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| LoaderError::Webhook("registration response missing gateway_key".to_string()))
    }

    /// Open the `/api/gateway/events` SSE stream and forward decoded
    /// events onto a channel as they arrive. The returned receiver closes
    /// when the connection ends (cleanly or otherwise); callers own the
    /// reconnect/backoff loop.
    pub async fn open_event_stream(&self) -> Result<tokio::sync::mpsc::Receiver<SseEvent>> {
        let url = format!("{}/api/gateway/events", self.base_url);
        let response = self.client.get(&url).header("X-API-Key", &self.api_key).header("Accept", "text/event-stream").send().await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut bytes = response.bytes_stream();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(_) => break,
                };
                for event in decoder.push(&chunk) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_timeout() {
        let client = ControlPlaneClient::new("https://control.example", "key", Duration::from_secs(10));
        assert_eq!(client.base_url, "https://control.example");
    }
}
