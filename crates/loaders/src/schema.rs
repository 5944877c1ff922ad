//! Wire shapes the control plane returns. Two coexisting schemas are
//! accepted for the pull endpoint, per the contract-loading channels.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayContractsResponse {
    pub success: bool,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub contracts: Vec<serde_json::Value>,
    pub synced_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySyncResponse {
    #[serde(default)]
    pub contracts: Vec<serde_json::Value>,
    #[serde(default)]
    pub guardrails: Vec<serde_json::Value>,
}

/// Notification carried on the `contract:approved` pub/sub channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractApprovedNotification {
    pub tenant_id: String,
    pub contract_id: String,
    #[serde(default)]
    pub approved_at: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

/// An SSE payload from `/api/gateway/events`, or the structurally
/// equivalent body of a webhook POST.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventPayload {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub contract_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    ContractRegistered,
    ContractUpdated,
    GuardrailDeployed,
    PolicyUpdated,
    Ping,
    Unknown(String),
}

impl From<&str> for GatewayEventKind {
    fn from(name: &str) -> Self {
        match name {
            "contract_registered" => Self::ContractRegistered,
            "contract_updated" => Self::ContractUpdated,
            "guardrail_deployed" => Self::GuardrailDeployed,
            "policy_updated" => Self::PolicyUpdated,
            "ping" => Self::Ping,
            other => Self::Unknown(other.to_string()),
        }
    }
}
