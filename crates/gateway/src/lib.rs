//! Transparent HTTP proxy gateway enforcing tenant-scoped policy
//! contracts on LLM API traffic.
//!
//! Exposes the structural and streaming proxy surfaces, a management API
//! for contracts and guardrails, webhooks, and a Prometheus `/metrics`
//! endpoint served on its own bind address.
//!
//! Built on Axum for high performance async HTTP.

pub mod auth;
pub mod compression;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod proxy;
pub mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::routing::{any, delete, get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use acvps_config::AppConfig;
use acvps_contracts::{ContractStore, RuntimeBindingTable};
use acvps_guardrails::GuardrailRegistry;
use acvps_llm::LlmClient;
use acvps_loaders::{
    spawn_periodic_pull, spawn_pubsub_listener, spawn_sse_listener, ControlPlaneClient, InMemoryCacheBackend, LoaderContext,
    SharedCacheBackend, TenantGuardrailCache,
};
use acvps_telemetry::{TelemetryConfig, TelemetryEngine};

use auth::CertificateResolver;
use state::{GatewayState, SharedGatewayState};

const DEFAULT_GUARDRAIL_REPO_TTL: Duration = Duration::from_secs(300);
const CERTIFICATE_CACHE_TTL: Duration = Duration::from_secs(60);
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// Build the proxy + management router, authenticated end to end.
pub fn build_router(state: SharedGatewayState) -> Router {
    let authenticated = Router::new()
        .route("/api/proxy", any(proxy::proxy_handler))
        .route("/api/proxy/{*path}", any(proxy::proxy_handler))
        .route("/api/stream/validate", any(proxy::stream_validate_handler))
        .route("/api/validate", post(handlers::validate_handler))
        .route("/api/extract-features", post(handlers::extract_features_handler))
        .route("/api/contracts", post(handlers::create_contract_handler).get(handlers::list_contracts_handler))
        .route("/api/contracts/{contract_id}", get(handlers::get_contract_handler))
        .route("/api/guardrails/register", post(handlers::register_guardrail_handler))
        .route("/api/guardrails/configs", get(handlers::list_guardrail_configs_handler))
        .route("/api/guardrails/configs/{id}", get(handlers::get_guardrail_config_handler))
        .route("/api/guardrails/list", get(handlers::list_guardrails_handler))
        .route("/api/guardrails/{id}", delete(handlers::delete_guardrail_handler))
        .route("/api/tenants/info", get(handlers::tenant_info_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    let cors = CorsLayer::permissive().max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/discovery/guardrails", get(handlers::discovery_guardrails_handler))
        .route("/api/webhooks", post(handlers::webhooks_handler))
        .merge(authenticated)
        .with_state(state)
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build the process-wide shared state: contract store, runtime
/// bindings, guardrail registry, loader channels, telemetry, and the
/// optional LLM client for dynamic guardrail evaluation.
async fn build_state(config: AppConfig) -> SharedGatewayState {
    let config = Arc::new(config);
    let store = Arc::new(ContractStore::new());
    let bindings = Arc::new(RuntimeBindingTable::new());
    let registry = Arc::new(GuardrailRegistry::with_builtins());

    let cache: Option<SharedCacheBackend> = if config.redis.disabled {
        Some(Arc::new(InMemoryCacheBackend::new()))
    } else {
        warn!("REDIS_DISABLED is false but this build carries no redis-backend feature wiring; falling back to the in-process cache");
        Some(Arc::new(InMemoryCacheBackend::new()))
    };

    let control_plane = config.control_plane_url.as_ref().map(|url| {
        Arc::new(ControlPlaneClient::new(
            url.clone(),
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(config.control_plane_timeout_secs),
        ))
    });

    let mut loader = LoaderContext::new(store.clone(), bindings.clone(), registry.clone());
    if let Some(cache) = &cache {
        loader = loader.with_cache(cache.clone());
    }
    if let Some(url) = &config.control_plane_url {
        loader = loader.with_control_plane(ControlPlaneClient::new(
            url.clone(),
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(config.control_plane_timeout_secs),
        ));
    }
    loader = loader.with_webhook_secret(config.webhook_secret.clone());
    let loader = Arc::new(loader);

    let telemetry = Arc::new(TelemetryEngine::new(TelemetryConfig::from(&config.metrics)));

    let llm = config.llm.active_api_key().map(|key| {
        Arc::new(LlmClient::new(
            "gateway-llm",
            "https://api.openai.com/v1",
            key,
            Duration::from_secs(config.llm_guardrail_timeout_secs),
        ))
    });

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.proxy_timeout_secs))
        .build()
        .expect("reqwest client builder with only timeout set cannot fail");

    let certificates = Arc::new(CertificateResolver::new(control_plane.clone(), CERTIFICATE_CACHE_TTL));
    let guardrail_sources = Arc::new(TenantGuardrailCache::new(
        Duration::from_secs(config.guardrail_repo_ttl_secs).max(DEFAULT_GUARDRAIL_REPO_TTL),
    ));

    Arc::new(GatewayState {
        config,
        store,
        bindings,
        registry,
        cache,
        control_plane,
        loader,
        telemetry,
        llm,
        llm_model: DEFAULT_LLM_MODEL.to_string(),
        http_client,
        certificates,
        guardrail_sources,
        started_at: Instant::now(),
    })
}

/// Start the gateway HTTP server: builds shared state, spins up the
/// loader background channels and the telemetry flush scheduler, then
/// serves the proxy/management router and the metrics router on their
/// respective bind addresses until either task exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let gateway_addr = config.gateway_bind_addr.clone();
    let metrics_addr = config.metrics_bind_addr.clone();
    let cold_load_on_boot = config.cold_load_on_boot;
    let pull_interval = Duration::from_secs(config.pull_interval_secs);
    let sse_enabled = config.sse_enabled;

    let state = build_state(config).await;

    if cold_load_on_boot {
        match state.loader.cold_load().await {
            Ok(n) => info!(loaded = n, "cold-loaded contracts from cache at boot"),
            Err(err) => warn!(error = %err, "cold load failed; continuing with an empty binding table"),
        }
    }

    let _pull_task = spawn_periodic_pull(state.loader.clone(), pull_interval);
    let _pubsub_task = spawn_pubsub_listener(state.loader.clone());
    let _sse_task = if sse_enabled { spawn_sse_listener(state.loader.clone()) } else { None };
    let _telemetry_task = state.telemetry.clone().spawn_scheduler();

    let app = build_router(state.clone());
    let metrics_app = metrics::metrics_router(state);

    info!(addr = %gateway_addr, "gateway starting");
    let gateway_listener = tokio::net::TcpListener::bind(&gateway_addr).await?;

    info!(addr = %metrics_addr, "metrics endpoint starting");
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr).await?;

    let gateway_server = axum::serve(gateway_listener, app);
    let metrics_server = axum::serve(metrics_listener, metrics_app);

    tokio::select! {
        result = gateway_server => result?,
        result = metrics_server => result?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_state() -> SharedGatewayState {
        let mut config = AppConfig::default();
        config.mode = acvps_config::GatewayMode::Local;
        config.tenant_id = "acme".into();
        build_state(config).await
    }

    #[tokio::test]
    async fn health_endpoint_is_unauthenticated() {
        let app = build_router(test_state().await);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn proxy_without_contract_header_is_rejected() {
        let app = build_router(test_state().await);
        let req = Request::builder().uri("/api/proxy").method("POST").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn expired_binding_is_evicted_instead_of_served_stale() {
        use acvps_core::key::TenantScopeKey;

        let state = test_state().await;
        let contract = acvps_contracts::Contract {
            contract_id: "hc-v1".into(),
            tenant_id: "acme".into(),
            version: "1".into(),
            status: acvps_contracts::ContractStatus::Active,
            guardrails: vec![],
            thresholds: Default::default(),
            failover_profile: acvps_core::FailoverProfile::Observe,
            suite: acvps_core::Suite::S0,
            backend_url: None,
            issued_at: chrono::Utc::now(),
            expires_at: chrono::Utc::now() + chrono::Duration::milliseconds(50),
            policy_digest: String::new(),
        };
        let key = TenantScopeKey::new("acme", "hc-v1");
        state.bindings.load(key.clone(), contract, &state.registry).unwrap();
        assert!(state.bindings.get(&key).is_some());

        tokio::time::sleep(std::time::Duration::from_millis(75)).await;

        let result = proxy::resolve_binding(&state, &key).await;
        assert!(result.is_err(), "an expired contract must not be served from a stale binding");
        assert!(state.bindings.get(&key).is_none());
    }
}
