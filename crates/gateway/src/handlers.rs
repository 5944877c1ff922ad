//! Management and discovery endpoints: health, guardrail discovery,
//! webhooks, direct validation (no forwarding), feature extraction, and
//! contract/guardrail CRUD.

use acvps_contracts::{normalize_wire_json, Contract};
use acvps_core::key::TenantScopeKey;
use acvps_core::metric::MetricMap;
use acvps_guardrails::{DynamicGuardrailConfig, Resolved};
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::TenantContext;
use crate::error::GatewayError;
use crate::proxy;
use crate::state::SharedGatewayState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: chrono::DateTime<Utc>,
    uptime_seconds: f64,
    contracts_bound: usize,
}

pub async fn health_handler(State(state): State<SharedGatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "acvps-gateway",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
        contracts_bound: state.bindings.len(),
    })
}

#[derive(Serialize)]
pub struct GuardrailSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    description: String,
    version: String,
}

#[derive(Serialize)]
pub struct DiscoveryResponse {
    count: usize,
    guardrails: Vec<GuardrailSummary>,
}

pub async fn discovery_guardrails_handler(State(state): State<SharedGatewayState>) -> Json<DiscoveryResponse> {
    let guardrails: Vec<GuardrailSummary> = state
        .registry
        .list()
        .into_iter()
        .filter_map(|id| match state.registry.resolve(&id) {
            Ok(Resolved::Compiled { metadata, .. }) => Some(GuardrailSummary {
                name: id.clone(),
                id,
                kind: "compiled",
                description: metadata.description,
                version: metadata.version,
            }),
            Ok(Resolved::Dynamic(config)) => Some(GuardrailSummary {
                name: id.clone(),
                id,
                kind: "dynamic",
                description: config.description,
                version: "1".to_string(),
            }),
            Err(_) => None,
        })
        .collect();
    Json(DiscoveryResponse { count: guardrails.len(), guardrails })
}

#[derive(Serialize)]
pub struct WebhookResponse {
    success: bool,
    received: String,
}

pub async fn webhooks_handler(State(state): State<SharedGatewayState>, headers: HeaderMap, body: Bytes) -> Result<impl IntoResponse, GatewayError> {
    let signature = headers.get("X-ACVPS-Signature").and_then(|v| v.to_str().ok());
    let payload = state.loader.handle_webhook(&body, signature).await.map_err(|err| GatewayError::WebhookRejected(err.to_string()))?;
    Ok(Json(WebhookResponse { success: true, received: payload.event }))
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    contract_id: String,
    payload: serde_json::Value,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    valid: bool,
    metrics: MetricMap,
    violations: Vec<acvps_core::metric::Violation>,
    extraction_ms: f64,
    validation_ms: f64,
}

pub async fn validate_handler(
    State(state): State<SharedGatewayState>,
    Extension(tenant): Extension<TenantContext>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, GatewayError> {
    let key = TenantScopeKey::new(tenant.tenant_id, request.contract_id);
    let binding = proxy::resolve_binding(&state, &key).await?;
    let phase = proxy::run_validation(&state, &binding, &request.payload).await;
    match phase.result {
        Some(result) => Ok(Json(ValidateResponse {
            valid: result.valid,
            metrics: result.metrics,
            violations: result.violations,
            extraction_ms: result.extraction_ms,
            validation_ms: result.validation_ms,
        })),
        None if phase.errored => Err(GatewayError::Validation(acvps_validation::ValidationError::MissingMetric { metric: "unknown".into() })),
        None => Ok(Json(ValidateResponse { valid: true, metrics: MetricMap::new(), violations: vec![], extraction_ms: 0.0, validation_ms: 0.0 })),
    }
}

#[derive(Deserialize)]
pub struct ExtractFeaturesRequest {
    guardrail_id: String,
    payload: serde_json::Value,
}

#[derive(Serialize)]
pub struct ExtractFeaturesResponse {
    metrics: MetricMap,
}

pub async fn extract_features_handler(
    State(state): State<SharedGatewayState>,
    Json(request): Json<ExtractFeaturesRequest>,
) -> Result<Json<ExtractFeaturesResponse>, GatewayError> {
    let llm = state.llm.as_deref();
    let metrics = acvps_guardrails::evaluate(&state.registry, &request.guardrail_id, &request.payload, llm, &state.llm_model)
        .await
        .map_err(|_| GatewayError::GuardrailNotFound(request.guardrail_id.clone()))?;
    Ok(Json(ExtractFeaturesResponse { metrics }))
}

pub async fn create_contract_handler(
    State(state): State<SharedGatewayState>,
    Extension(tenant): Extension<TenantContext>,
    Json(raw): Json<serde_json::Value>,
) -> Result<impl IntoResponse, GatewayError> {
    let normalized = normalize_wire_json(raw);
    let mut contract: Contract = serde_json::from_value(normalized)?;
    contract.tenant_id = tenant.tenant_id.clone();
    contract.validate()?;
    contract.policy_digest = contract.recompute_policy_digest();

    let key = TenantScopeKey::new(contract.tenant_id.clone(), contract.contract_id.clone());
    let contract_json = serde_json::to_string(&contract)?;
    state.store.put_both_forms(&key, contract_json);

    if contract.is_enforceable(Utc::now()) {
        if let Err(err) = state.bindings.load(key, contract.clone(), &state.registry) {
            tracing::warn!(contract = %contract.contract_id, error = %err, "contract stored but could not be bound");
        }
    }

    Ok((StatusCode::CREATED, Json(contract)))
}

pub async fn get_contract_handler(
    State(state): State<SharedGatewayState>,
    Extension(tenant): Extension<TenantContext>,
    Path(contract_id): Path<String>,
) -> Result<Json<Contract>, GatewayError> {
    let key = TenantScopeKey::new(tenant.tenant_id, contract_id.clone());
    let raw = state.store.get(&key).ok_or_else(|| GatewayError::ContractNotFound(contract_id.clone()))?;
    let contract: Contract = serde_json::from_str(&raw)?;
    Ok(Json(contract))
}

#[derive(Serialize)]
pub struct ContractSummary {
    contract_id: String,
    version: String,
    status: acvps_contracts::ContractStatus,
    expires_at: chrono::DateTime<Utc>,
}

pub async fn list_contracts_handler(State(state): State<SharedGatewayState>, Extension(tenant): Extension<TenantContext>) -> Json<Vec<ContractSummary>> {
    let summaries = state
        .bindings
        .list()
        .into_iter()
        .filter(|key| key.tenant == tenant.tenant_id)
        .filter_map(|key| state.bindings.get(&key))
        .map(|binding| ContractSummary {
            contract_id: binding.contract.contract_id,
            version: binding.contract.version,
            status: binding.contract.status,
            expires_at: binding.contract.expires_at,
        })
        .collect();
    Json(summaries)
}

pub async fn register_guardrail_handler(
    State(state): State<SharedGatewayState>,
    Json(config): Json<DynamicGuardrailConfig>,
) -> Result<impl IntoResponse, GatewayError> {
    let id = config.id.clone();
    state.registry.register_dynamic(config).map_err(|_| GatewayError::GuardrailAlreadyRegistered(id))?;
    Ok(StatusCode::CREATED)
}

pub async fn list_guardrail_configs_handler(State(state): State<SharedGatewayState>) -> Json<Vec<DynamicGuardrailConfig>> {
    Json(state.registry.list_configs())
}

pub async fn get_guardrail_config_handler(
    State(state): State<SharedGatewayState>,
    Path(id): Path<String>,
) -> Result<Json<DynamicGuardrailConfig>, GatewayError> {
    state.registry.get_config(&id).map(Json).ok_or_else(|| GatewayError::GuardrailNotFound(id))
}

pub async fn list_guardrails_handler(State(state): State<SharedGatewayState>) -> Json<Vec<String>> {
    Json(state.registry.list())
}

pub async fn delete_guardrail_handler(State(state): State<SharedGatewayState>, Path(id): Path<String>) -> Result<StatusCode, GatewayError> {
    if state.registry.get_config(&id).is_none() {
        return Err(GatewayError::BuiltinGuardrailImmutable(id));
    }
    state.registry.unregister_dynamic(&id).map_err(|_| GatewayError::GuardrailNotFound(id))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct TenantInfoResponse {
    tenant_id: String,
    mode: &'static str,
    contracts_bound: usize,
}

pub async fn tenant_info_handler(State(state): State<SharedGatewayState>, Extension(tenant): Extension<TenantContext>) -> Json<TenantInfoResponse> {
    let contracts_bound = state.bindings.list().iter().filter(|key| key.tenant == tenant.tenant_id).count();
    let mode = match state.config.mode {
        acvps_config::GatewayMode::Local => "local",
        acvps_config::GatewayMode::Cloud => "cloud",
    };
    Json(TenantInfoResponse { tenant_id: tenant.tenant_id, mode, contracts_bound })
}
