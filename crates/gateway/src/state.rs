//! Process-wide shared state, built once in [`crate::start`] and handed
//! to every handler behind an `Arc`.

use std::sync::Arc;
use std::time::Instant;

use acvps_config::AppConfig;
use acvps_contracts::{ContractStore, RuntimeBindingTable};
use acvps_guardrails::GuardrailRegistry;
use acvps_llm::LlmClient;
use acvps_loaders::{ControlPlaneClient, LoaderContext, SharedCacheBackend, TenantGuardrailCache};
use acvps_telemetry::TelemetryEngine;

use crate::auth::CertificateResolver;

pub struct GatewayState {
    pub config: Arc<AppConfig>,
    pub store: Arc<ContractStore>,
    pub bindings: Arc<RuntimeBindingTable>,
    pub registry: Arc<GuardrailRegistry>,
    pub cache: Option<SharedCacheBackend>,
    pub control_plane: Option<Arc<ControlPlaneClient>>,
    pub loader: Arc<LoaderContext>,
    pub telemetry: Arc<TelemetryEngine>,
    pub llm: Option<Arc<LlmClient>>,
    pub llm_model: String,
    pub http_client: reqwest::Client,
    pub certificates: Arc<CertificateResolver>,
    pub guardrail_sources: Arc<TenantGuardrailCache>,
    pub started_at: Instant,
}

pub type SharedGatewayState = Arc<GatewayState>;
