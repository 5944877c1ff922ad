//! The proxy pipeline: bind a request to its tenant's contract, validate
//! request and response payloads against that contract's thresholds, and
//! forward to the real backend — all while returning the backend's
//! response byte-for-byte when nothing is blocked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use acvps_contracts::{normalize_wire_json, Contract, RuntimeBinding};
use acvps_core::evidence::{RequestEvent, RequestStatus, TraceId, ViolationEvent, ViolationSeverity};
use acvps_core::key::TenantScopeKey;
use acvps_core::metric::{MetricMap, Violation};
use acvps_loaders::netguard::rewrite_localhost;
use acvps_validation::ValidationResult;
use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;

use crate::auth::TenantContext;
use crate::compression;
use crate::error::GatewayError;
use crate::state::SharedGatewayState;

/// Headers the gateway consumes itself and never forwards to the
/// backend, since the backend has no business seeing gateway-internal
/// routing or auth material.
const STRIPPED_HEADERS: &[&str] = &[
    "x-api-key",
    "x-tenant-id",
    "x-contract-id",
    "x-dc-id",
    "x-certificate-id",
    "x-target-endpoint",
    "x-acvps-trace-id",
    "host",
    "content-length",
];

struct RequestIdentity {
    tenant_id: String,
    contract_id: String,
    target_override: Option<String>,
    trace_id: String,
}

async fn resolve_identity(state: &SharedGatewayState, tenant: &TenantContext, headers: &HeaderMap) -> Result<RequestIdentity, GatewayError> {
    let trace_id = headers
        .get("X-ACVPS-Trace-ID")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| TraceId::new().0);

    if let Some(certificate_id) = headers.get("X-Certificate-ID").and_then(|v| v.to_str().ok()) {
        let info = state.certificates.resolve(certificate_id).await.ok_or(GatewayError::CertificateRequired)?;
        return Ok(RequestIdentity { tenant_id: info.tenant_id, contract_id: info.contract_id, target_override: None, trace_id });
    }

    let contract_id = headers
        .get("X-Contract-ID")
        .or_else(|| headers.get("X-DC-Id"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(GatewayError::MissingHeader("X-Contract-ID"))?;

    let target_override = headers.get("X-Target-Endpoint").and_then(|v| v.to_str().ok()).map(str::to_string);

    Ok(RequestIdentity { tenant_id: tenant.tenant_id.clone(), contract_id, target_override, trace_id })
}

pub(crate) async fn resolve_binding(state: &SharedGatewayState, key: &TenantScopeKey) -> Result<RuntimeBinding, GatewayError> {
    if let Some(binding) = state.bindings.get(key) {
        if binding.contract.is_enforceable(Utc::now()) {
            return Ok(binding);
        }
        state.bindings.unload(key);
    }

    if let Some(raw) = state.store.get(key) {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&raw) {
            let normalized = normalize_wire_json(parsed);
            if let Ok(contract) = serde_json::from_value::<Contract>(normalized) {
                if contract.is_enforceable(Utc::now()) {
                    let _ = state.bindings.load(key.clone(), contract, &state.registry);
                    if let Some(binding) = state.bindings.get(key) {
                        return Ok(binding);
                    }
                }
            }
        }
    }

    let _ = state.loader.load_targeted(&key.tenant, &key.contract).await;
    state.bindings.get(key).ok_or_else(|| GatewayError::ContractNotFound(key.contract.clone()))
}

fn forward_target(identity: &RequestIdentity, contract: &Contract) -> Result<String, GatewayError> {
    identity
        .target_override
        .clone()
        .or_else(|| contract.backend_url.clone())
        .map(|url| rewrite_localhost(&url))
        .ok_or(GatewayError::MissingHeader("X-Target-Endpoint"))
}

/// Cloud Run's default `*.run.app` domain requires a Google-signed
/// identity token on every request. Best-effort: on anything but GCP the
/// metadata-server call fails fast and the request is forwarded without
/// the token, same as any other unreachable-sidecar condition.
async fn mint_identity_token(client: &reqwest::Client, target: &str) -> Option<String> {
    let host = target.split("://").nth(1)?.split('/').next()?.split(':').next()?;
    if !host.ends_with(".run.app") {
        return None;
    }

    let audience = format!("{}://{host}", target.split("://").next()?);
    let url = format!(
        "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/identity?audience={audience}"
    );
    let response = client.get(&url).header("Metadata-Flavor", "Google").timeout(Duration::from_millis(500)).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

fn extract_request_field(body: &serde_json::Value) -> serde_json::Value {
    for field in ["query", "input", "prompt"] {
        if let Some(value) = body.get(field) {
            return value.clone();
        }
    }
    body.clone()
}

fn extract_response_field(body: &serde_json::Value) -> serde_json::Value {
    for field in ["response", "output", "message"] {
        if let Some(value) = body.get(field) {
            return value.clone();
        }
    }
    if let Some(content) = body.pointer("/choices/0/message/content") {
        return content.clone();
    }
    body.clone()
}

fn severity_for(violation: &Violation) -> ViolationSeverity {
    let range = (violation.max - violation.min).abs().max(f64::EPSILON);
    let overshoot = if violation.value > violation.max {
        violation.value - violation.max
    } else {
        violation.min - violation.value
    };
    let ratio = overshoot / range;
    if ratio < 0.1 {
        ViolationSeverity::Low
    } else if ratio < 0.3 {
        ViolationSeverity::Medium
    } else if ratio < 1.0 {
        ViolationSeverity::High
    } else {
        ViolationSeverity::Critical
    }
}

fn violation_events(trace_id: &str, contract_id: &str, tenant_id: &str, violations: &[Violation]) -> Vec<ViolationEvent> {
    violations
        .iter()
        .map(|v| ViolationEvent {
            trace_id: trace_id.to_string(),
            contract_id: contract_id.to_string(),
            tenant_id: tenant_id.to_string(),
            metric: v.metric.clone(),
            value: v.value,
            threshold: v.clone(),
            severity: severity_for(v),
            details: format!("{} = {} outside [{}, {}]", v.metric, v.value, v.min, v.max),
            timestamp: Utc::now(),
        })
        .collect()
}

#[derive(Serialize)]
struct BlockedBody {
    error: &'static str,
    message: String,
    details: BlockedDetails,
}

#[derive(Serialize)]
struct BlockedDetails {
    contract_id: String,
    trace_id: String,
    violations: Vec<Violation>,
}

fn blocked_response(contract_id: &str, trace_id: &str, violations: Vec<Violation>) -> Response {
    let body = BlockedBody {
        error: "CONTRACT_VIOLATION",
        message: "request blocked by policy contract".to_string(),
        details: BlockedDetails { contract_id: contract_id.to_string(), trace_id: trace_id.to_string(), violations },
    };
    let mut response = (StatusCode::FORBIDDEN, Json(body)).into_response();
    response.headers_mut().insert("X-ACVPS-Status", HeaderValue::from_static("blocked"));
    response.headers_mut().insert("X-ACVPS-Trace-ID", HeaderValue::from_str(trace_id).unwrap_or(HeaderValue::from_static("")));
    response
}

fn apply_observability_headers(headers: &mut HeaderMap, status: &str, trace_id: &str, validation_ms: f64, metrics: &MetricMap) {
    headers.insert("X-ACVPS-Status", HeaderValue::from_str(status).unwrap_or(HeaderValue::from_static("passed")));
    headers.insert("X-ACVPS-Trace-ID", HeaderValue::from_str(trace_id).unwrap_or(HeaderValue::from_static("")));
    headers.insert("X-ACVPS-Validation-Ms", HeaderValue::from_str(&format!("{validation_ms:.3}")).unwrap_or(HeaderValue::from_static("0")));
    for (metric, value) in metrics {
        let name = format!("x-acvps-feature-{}", metric.replace('_', "-"));
        if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) {
            if let Ok(header_value) = HeaderValue::from_str(&format!("{value:.6}")) {
                headers.insert(header_name, header_value);
            }
        }
    }
}

pub(crate) struct Phase {
    pub(crate) result: Option<ValidationResult>,
    pub(crate) errored: bool,
}

pub(crate) async fn run_validation(state: &SharedGatewayState, binding: &RuntimeBinding, payload: &serde_json::Value) -> Phase {
    if binding.is_pass_through() {
        return Phase { result: None, errored: false };
    }
    let llm = state.llm.as_deref();
    match acvps_validation::validate(binding, payload, &state.registry, llm, &state.llm_model).await {
        Ok(result) => Phase { result: Some(result), errored: false },
        Err(err) => {
            tracing::warn!(contract = %binding.contract.contract_id, error = %err, "validation failed unexpectedly, allowing request through");
            Phase { result: None, errored: true }
        }
    }
}

/// The full structural proxy pipeline, shared by `/api/proxy` and its
/// HTTP-method aliases.
pub async fn proxy_handler(
    State(state): State<SharedGatewayState>,
    Extension(tenant): Extension<TenantContext>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match run_proxy(state, tenant, method, headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn run_proxy(state: SharedGatewayState, tenant: TenantContext, method: Method, headers: HeaderMap, body: Bytes) -> Result<Response, GatewayError> {
    let start = Instant::now();
    let identity = resolve_identity(&state, &tenant, &headers).await?;
    let key = TenantScopeKey::new(identity.tenant_id.clone(), identity.contract_id.clone());
    let binding = resolve_binding(&state, &key).await?;
    let target = forward_target(&identity, &binding.contract)?;

    let request_parsed: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::String(String::from_utf8_lossy(&body).to_string()));
    let request_field = extract_request_field(&request_parsed);

    let mut validation_error = false;
    let mut all_metrics = MetricMap::new();
    let mut all_violations: Vec<Violation> = Vec::new();
    let mut validation_ms_total = 0.0;

    let request_phase = run_validation(&state, &binding, &request_field).await;
    if request_phase.errored {
        validation_error = true;
    }
    if let Some(result) = &request_phase.result {
        all_metrics.extend(result.metrics.clone());
        validation_ms_total += result.extraction_ms + result.validation_ms;
        if !result.valid {
            let events = violation_events(&identity.trace_id, &identity.contract_id, &identity.tenant_id, &result.violations);
            for event in &events {
                state.telemetry.add_violation(event.clone());
            }
            all_violations.extend(result.violations.clone());
            if binding.contract.failover_profile.blocks_on_violation() {
                state.telemetry.add_request(RequestEvent {
                    trace_id: identity.trace_id.clone(),
                    contract_id: identity.contract_id.clone(),
                    tenant_id: identity.tenant_id.clone(),
                    status: RequestStatus::Blocked,
                    metrics: all_metrics,
                    latency_ms: start.elapsed().as_millis() as u64,
                    request_bytes: body.len(),
                    response_bytes: 0,
                    timestamp: Utc::now(),
                });
                return Ok(blocked_response(&identity.contract_id, &identity.trace_id, all_violations));
            }
            tracing::info!(contract = %identity.contract_id, "request violates policy under observe profile, proceeding");
        }
    }

    let mut outbound = state.http_client.request(method, &target);
    for (name, value) in headers.iter() {
        if STRIPPED_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        outbound = outbound.header(name, value);
    }
    if let Some(token) = mint_identity_token(&state.http_client, &target).await {
        outbound = outbound.header("Authorization", format!("Bearer {token}"));
    }
    outbound = outbound.body(body.clone());

    let backend_response = outbound
        .send()
        .await
        .map_err(|err| GatewayError::BackendUnreachable(err.to_string()))?;

    let backend_status = backend_response.status();
    let backend_headers = backend_response.headers().clone();
    let content_encoding = backend_headers.get("content-encoding").and_then(|v| v.to_str().ok()).map(str::to_string);
    let response_bytes = backend_response.bytes().await.map_err(|err| GatewayError::BackendUnreadable(err.to_string()))?;

    let decoded = compression::decode_for_validation(&response_bytes, content_encoding.as_deref());
    let response_parsed: serde_json::Value =
        serde_json::from_slice(&decoded).unwrap_or(serde_json::Value::String(String::from_utf8_lossy(&decoded).to_string()));
    let response_field = extract_response_field(&response_parsed);

    let response_phase = run_validation(&state, &binding, &response_field).await;
    if response_phase.errored {
        validation_error = true;
    }
    let mut blocked = false;
    if let Some(result) = &response_phase.result {
        all_metrics.extend(result.metrics.clone());
        validation_ms_total += result.extraction_ms + result.validation_ms;
        if !result.valid {
            let events = violation_events(&identity.trace_id, &identity.contract_id, &identity.tenant_id, &result.violations);
            for event in &events {
                state.telemetry.add_violation(event.clone());
            }
            all_violations.extend(result.violations.clone());
            if binding.contract.failover_profile.blocks_on_violation() {
                blocked = true;
            } else {
                tracing::info!(contract = %identity.contract_id, "response violates policy under observe profile, proceeding");
            }
        }
    }

    state.telemetry.add_request(RequestEvent {
        trace_id: identity.trace_id.clone(),
        contract_id: identity.contract_id.clone(),
        tenant_id: identity.tenant_id.clone(),
        status: if blocked { RequestStatus::Blocked } else { RequestStatus::Allowed },
        metrics: all_metrics.clone(),
        latency_ms: start.elapsed().as_millis() as u64,
        request_bytes: body.len(),
        response_bytes: response_bytes.len(),
        timestamp: Utc::now(),
    });

    if blocked {
        return Ok(blocked_response(&identity.contract_id, &identity.trace_id, all_violations));
    }

    let status = if validation_error { "not-validated" } else { "passed" };
    let mut response = Response::builder().status(backend_status.as_u16()).body(axum::body::Body::from(response_bytes)).expect("status/body always build a valid response");
    for (name, value) in backend_headers.iter() {
        if name.as_str().eq_ignore_ascii_case("content-length") {
            continue;
        }
        response.headers_mut().append(name, value.clone());
    }
    apply_observability_headers(response.headers_mut(), status, &identity.trace_id, validation_ms_total, &all_metrics);
    Ok(response)
}

/// The stream-validation variant: skips structural JSON extraction
/// entirely and runs the probabilistic streaming guardrails directly
/// over the raw request/response bytes, surfacing confidence in the
/// response headers instead of per-field metrics.
pub async fn stream_validate_handler(
    State(state): State<SharedGatewayState>,
    Extension(tenant): Extension<TenantContext>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match run_stream_proxy(state, tenant, method, headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn binding_stream_configs(state: &SharedGatewayState, binding: &RuntimeBinding) -> Vec<acvps_guardrails::config::DynamicGuardrailConfig> {
    binding.guardrail_ids.iter().filter_map(|id| state.registry.get_config(id)).collect()
}

/// Check every stream-produced metric against the contract's thresholds.
/// Unlike structural validation, a metric absent from this phase's output
/// (e.g. a guardrail that only fires on the response leg) is simply not
/// checked here rather than treated as an error.
fn stream_violations(thresholds: &acvps_core::metric::ThresholdSet, metrics: &MetricMap) -> Vec<Violation> {
    metrics
        .iter()
        .filter_map(|(metric, value)| {
            let bounds = thresholds.get(metric)?;
            if bounds.contains(*value) {
                None
            } else {
                Some(Violation::new(metric.clone(), *value, *bounds))
            }
        })
        .collect()
}

async fn run_stream_proxy(state: SharedGatewayState, tenant: TenantContext, method: Method, headers: HeaderMap, body: Bytes) -> Result<Response, GatewayError> {
    use acvps_guardrails::stream::{evaluate_stream, StreamContext, StreamDirection};

    let start = Instant::now();
    let identity = resolve_identity(&state, &tenant, &headers).await?;
    let key = TenantScopeKey::new(identity.tenant_id.clone(), identity.contract_id.clone());
    let binding = resolve_binding(&state, &key).await?;
    let target = forward_target(&identity, &binding.contract)?;

    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("application/octet-stream").to_string();
    let stream_configs = binding_stream_configs(&state, &binding);
    let mut request_metrics = MetricMap::new();
    let mut request_confidence = 1.0_f64;
    for config in &stream_configs {
        let (metrics, confidence) =
            evaluate_stream(&body, &StreamContext { direction: StreamDirection::Request, content_type: content_type.clone() }, config);
        request_metrics.extend(metrics);
        request_confidence = request_confidence.min(confidence);
    }

    let mut all_violations = stream_violations(&binding.contract.thresholds, &request_metrics);
    if !all_violations.is_empty() {
        let events = violation_events(&identity.trace_id, &identity.contract_id, &identity.tenant_id, &all_violations);
        for event in &events {
            state.telemetry.add_violation(event.clone());
        }
        if binding.contract.failover_profile.blocks_on_violation() {
            state.telemetry.add_request(RequestEvent {
                trace_id: identity.trace_id.clone(),
                contract_id: identity.contract_id.clone(),
                tenant_id: identity.tenant_id.clone(),
                status: RequestStatus::Blocked,
                metrics: request_metrics,
                latency_ms: start.elapsed().as_millis() as u64,
                request_bytes: body.len(),
                response_bytes: 0,
                timestamp: Utc::now(),
            });
            return Ok(blocked_response(&identity.contract_id, &identity.trace_id, all_violations));
        }
        tracing::info!(contract = %identity.contract_id, "stream request violates policy under observe profile, proceeding");
    }

    let mut outbound = state.http_client.request(method, &target);
    for (name, value) in headers.iter() {
        if STRIPPED_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        outbound = outbound.header(name, value);
    }
    outbound = outbound.body(body.clone());

    let backend_response = outbound.send().await.map_err(|err| GatewayError::BackendUnreachable(err.to_string()))?;
    let backend_status = backend_response.status();
    let backend_headers = backend_response.headers().clone();
    let response_bytes = backend_response.bytes().await.map_err(|err| GatewayError::BackendUnreadable(err.to_string()))?;

    let mut response_metrics = MetricMap::new();
    let mut response_confidence = 1.0_f64;
    for config in &stream_configs {
        let (metrics, confidence) =
            evaluate_stream(&response_bytes, &StreamContext { direction: StreamDirection::Response, content_type: content_type.clone() }, config);
        response_metrics.extend(metrics);
        response_confidence = response_confidence.min(confidence);
    }

    let response_violations = stream_violations(&binding.contract.thresholds, &response_metrics);
    let mut blocked = false;
    if !response_violations.is_empty() {
        let events = violation_events(&identity.trace_id, &identity.contract_id, &identity.tenant_id, &response_violations);
        for event in &events {
            state.telemetry.add_violation(event.clone());
        }
        all_violations.extend(response_violations);
        if binding.contract.failover_profile.blocks_on_violation() {
            blocked = true;
        } else {
            tracing::info!(contract = %identity.contract_id, "stream response violates policy under observe profile, proceeding");
        }
    }

    let all_metrics: MetricMap = request_metrics.into_iter().chain(response_metrics).collect();
    state.telemetry.add_request(RequestEvent {
        trace_id: identity.trace_id.clone(),
        contract_id: identity.contract_id.clone(),
        tenant_id: identity.tenant_id.clone(),
        status: if blocked { RequestStatus::Blocked } else { RequestStatus::Allowed },
        metrics: all_metrics,
        latency_ms: start.elapsed().as_millis() as u64,
        request_bytes: body.len(),
        response_bytes: response_bytes.len(),
        timestamp: Utc::now(),
    });

    if blocked {
        return Ok(blocked_response(&identity.contract_id, &identity.trace_id, all_violations));
    }

    let mut response = Response::builder().status(backend_status.as_u16()).body(axum::body::Body::from(response_bytes)).expect("status/body always build a valid response");
    for (name, value) in backend_headers.iter() {
        if name.as_str().eq_ignore_ascii_case("content-length") {
            continue;
        }
        response.headers_mut().append(name, value.clone());
    }
    response.headers_mut().insert("X-ACVPS-Status", HeaderValue::from_static("passed"));
    response.headers_mut().insert("X-EthicalZen-Validated", HeaderValue::from_static("true"));
    response.headers_mut().insert("X-ACVPS-Trace-ID", HeaderValue::from_str(&identity.trace_id).unwrap_or(HeaderValue::from_static("")));
    response.headers_mut().insert("X-ACVPS-Request-Confidence", HeaderValue::from_str(&format!("{request_confidence:.3}")).unwrap_or(HeaderValue::from_static("0")));
    response.headers_mut().insert("X-ACVPS-Response-Confidence", HeaderValue::from_str(&format!("{response_confidence:.3}")).unwrap_or(HeaderValue::from_static("0")));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_named_request_field() {
        let body = serde_json::json!({"query": "what is the refund policy?"});
        assert_eq!(extract_request_field(&body), serde_json::json!("what is the refund policy?"));
    }

    #[test]
    fn falls_back_to_whole_body_when_no_named_field() {
        let body = serde_json::json!({"foo": "bar"});
        assert_eq!(extract_request_field(&body), body);
    }

    #[test]
    fn extracts_nested_choices_content() {
        let body = serde_json::json!({"choices": [{"message": {"content": "the answer is 42"}}]});
        assert_eq!(extract_response_field(&body), serde_json::json!("the answer is 42"));
    }

    #[test]
    fn severity_scales_with_overshoot() {
        let small = Violation { metric: "m".into(), value: 0.21, min: 0.0, max: 0.2 };
        let large = Violation { metric: "m".into(), value: 0.9, min: 0.0, max: 0.2 };
        assert_eq!(severity_for(&small), ViolationSeverity::Low);
        assert_eq!(severity_for(&large), ViolationSeverity::Critical);
    }

    #[test]
    fn forward_target_prefers_header_over_contract_backend() {
        let identity = RequestIdentity { tenant_id: "acme".into(), contract_id: "hc-v1".into(), target_override: Some("http://localhost:4000/v1".into()), trace_id: "t1".into() };
        let mut contract = base_contract();
        contract.backend_url = Some("https://echo.example".into());
        let target = forward_target(&identity, &contract).unwrap();
        assert_eq!(target, "http://host.docker.internal:4000/v1");
    }

    #[test]
    fn forward_target_missing_both_is_an_error() {
        let identity = RequestIdentity { tenant_id: "acme".into(), contract_id: "hc-v1".into(), target_override: None, trace_id: "t1".into() };
        let contract = base_contract();
        assert!(forward_target(&identity, &contract).is_err());
    }

    fn base_contract() -> Contract {
        Contract {
            contract_id: "hc-v1".into(),
            tenant_id: "acme".into(),
            version: "1".into(),
            status: acvps_contracts::ContractStatus::Active,
            guardrails: vec![],
            thresholds: Default::default(),
            failover_profile: acvps_core::FailoverProfile::Strict,
            suite: acvps_core::Suite::S0,
            backend_url: None,
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            policy_digest: String::new(),
        }
    }

}
