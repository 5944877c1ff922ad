//! Orchestrates the five coexisting loader channels against a shared
//! contract store and runtime binding table. Every channel funnels through
//! [`LoaderContext::apply_contract_json`], so idempotent loading and
//! binding refresh happen exactly once regardless of which channel
//! triggered it.

use std::sync::Arc;
use std::time::Duration;

use acvps_contracts::{normalize_wire_json, Contract, ContractStore, RuntimeBindingTable};
use acvps_core::key::TenantScopeKey;
use acvps_guardrails::GuardrailRegistry;

use crate::cache::SharedCacheBackend;
use crate::control_plane::ControlPlaneClient;
use crate::error::Result;
use crate::schema::{ContractApprovedNotification, GatewayEventKind, GatewayEventPayload};
use crate::webhook::{parse_webhook, WebhookPayload};

pub struct LoaderContext {
    pub store: Arc<ContractStore>,
    pub bindings: Arc<RuntimeBindingTable>,
    pub registry: Arc<GuardrailRegistry>,
    pub cache: Option<SharedCacheBackend>,
    pub control_plane: Option<Arc<ControlPlaneClient>>,
    pub webhook_secret: Option<String>,
}

impl LoaderContext {
    pub fn new(store: Arc<ContractStore>, bindings: Arc<RuntimeBindingTable>, registry: Arc<GuardrailRegistry>) -> Self {
        Self { store, bindings, registry, cache: None, control_plane: None, webhook_secret: None }
    }

    pub fn with_cache(mut self, cache: SharedCacheBackend) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_control_plane(mut self, client: ControlPlaneClient) -> Self {
        self.control_plane = Some(Arc::new(client));
        self
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret;
        self
    }

    /// Normalize, parse, enforceability-check, store, and bind one
    /// contract. Non-enforceable contracts are skipped, not an error —
    /// they may simply be pending approval or expired.
    pub fn apply_contract_json(&self, raw: serde_json::Value) -> Result<bool> {
        let normalized = normalize_wire_json(raw);
        let contract: Contract = serde_json::from_value(normalized)?;
        contract.validate()?;

        let key = TenantScopeKey::new(contract.tenant_id.as_str(), contract.contract_id.as_str());
        if !contract.is_enforceable(chrono::Utc::now()) {
            if self.bindings.unload(&key) {
                tracing::info!(contract = %contract.contract_id, "contract no longer enforceable, binding removed");
            } else {
                tracing::debug!(contract = %contract.contract_id, "skipping non-enforceable contract");
            }
            return Ok(false);
        }

        let contract_json = serde_json::to_string(&contract)?;
        self.store.put_both_forms(&key, contract_json);
        self.bindings.load(key, contract, &self.registry)?;
        Ok(true)
    }

    /// Cold load at boot: scan the cache for either key form; fall back
    /// to an HTTP pull when no cache backend is configured.
    pub async fn cold_load(&self) -> Result<usize> {
        let Some(cache) = &self.cache else {
            return self.pull_all().await;
        };

        let mut seen = std::collections::HashSet::new();
        let mut loaded = 0;
        for prefix in ["tenant:", "contract:tenant-"] {
            for (raw_key, value) in cache.scan_prefix(prefix).await? {
                let Some(key) = TenantScopeKey::parse(&raw_key) else { continue };
                if !seen.insert(key) {
                    continue;
                }
                let parsed: serde_json::Value = serde_json::from_str(&value)?;
                if self.apply_contract_json(parsed)? {
                    loaded += 1;
                }
            }
        }
        Ok(loaded)
    }

    /// `GET /api/gateway/contracts`, normalized and loaded one at a time.
    pub async fn pull_all(&self) -> Result<usize> {
        let Some(control_plane) = &self.control_plane else {
            return Ok(0);
        };
        let contracts = control_plane.pull_contracts().await?;
        let mut loaded = 0;
        for raw in contracts {
            if self.apply_contract_json(raw)? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Fetch and load a single contract by id. Falls back to a full pull
    /// when the targeted fetch fails or no control plane is configured.
    pub async fn load_targeted(&self, tenant_id: &str, contract_id: &str) -> Result<()> {
        if let Some(control_plane) = &self.control_plane {
            match control_plane.pull_single(tenant_id, contract_id).await {
                Ok(raw) => {
                    self.apply_contract_json(raw)?;
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(tenant_id, contract_id, error = %err, "targeted load failed, falling back to full pull");
                }
            }
        }
        self.pull_all().await?;
        Ok(())
    }

    /// Dispatch an event payload naming a tenant/contract to a targeted
    /// load, falling back to a full pull when the payload is ambiguous.
    async fn handle_event_payload(&self, payload: &GatewayEventPayload) -> Result<()> {
        match (&payload.tenant_id, &payload.contract_id) {
            (Some(tenant), Some(contract)) => self.load_targeted(tenant, contract).await,
            _ => self.pull_all().await.map(|_| ()),
        }
    }

    /// Handle a `contract:approved` pub/sub notification: load just the
    /// named contract.
    pub async fn handle_approval(&self, notification: ContractApprovedNotification) -> Result<()> {
        self.load_targeted(&notification.tenant_id, &notification.contract_id).await
    }

    /// Handle one decoded SSE event from the control plane.
    pub async fn handle_sse_event(&self, event_name: Option<String>, data: String) -> Result<()> {
        let kind = GatewayEventKind::from(event_name.as_deref().unwrap_or(""));
        match kind {
            GatewayEventKind::Ping => Ok(()),
            GatewayEventKind::ContractRegistered | GatewayEventKind::ContractUpdated | GatewayEventKind::GuardrailDeployed | GatewayEventKind::PolicyUpdated => {
                let payload: GatewayEventPayload = serde_json::from_str(&data).unwrap_or(GatewayEventPayload { tenant_id: None, contract_id: None });
                self.handle_event_payload(&payload).await
            }
            GatewayEventKind::Unknown(name) => {
                tracing::debug!(event = %name, "ignoring unrecognized control-plane event");
                Ok(())
            }
        }
    }

    /// Validate and dispatch a webhook delivery.
    pub async fn handle_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookPayload> {
        let payload = parse_webhook(body, signature, self.webhook_secret.as_deref())?;
        let event_payload = GatewayEventPayload { tenant_id: payload.tenant_id.clone(), contract_id: payload.contract_id.clone() };
        self.handle_event_payload(&event_payload).await?;
        Ok(payload)
    }
}

/// Spawn the periodic-pull ticker. Runs until the process exits; loader
/// errors are logged and never stop the loop.
pub fn spawn_periodic_pull(ctx: Arc<LoaderContext>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match ctx.pull_all().await {
                Ok(n) => tracing::debug!(loaded = n, "periodic pull completed"),
                Err(err) => tracing::warn!(error = %err, "periodic pull failed"),
            }
        }
    })
}

/// Subscribe to `contract:approved` and trigger targeted loads for as
/// long as the cache backend stays reachable.
pub fn spawn_pubsub_listener(ctx: Arc<LoaderContext>) -> Option<tokio::task::JoinHandle<()>> {
    let cache = ctx.cache.clone()?;
    Some(tokio::spawn(async move {
        let mut rx = match cache.subscribe("contract:approved").await {
            Ok(rx) => rx,
            Err(err) => {
                tracing::warn!(error = %err, "could not subscribe to contract:approved");
                return;
            }
        };
        while let Ok(message) = rx.recv().await {
            match serde_json::from_str::<ContractApprovedNotification>(&message) {
                Ok(notification) => {
                    if let Err(err) = ctx.handle_approval(notification).await {
                        tracing::warn!(error = %err, "failed to handle contract:approved notification");
                    }
                }
                Err(err) => tracing::warn!(error = %err, "malformed contract:approved payload"),
            }
        }
    }))
}

/// Run the SSE listener with fixed reconnect backoff: 5s on a clean
/// disconnect, 30s after a connection error.
pub fn spawn_sse_listener(ctx: Arc<LoaderContext>) -> Option<tokio::task::JoinHandle<()>> {
    let control_plane = ctx.control_plane.clone()?;
    Some(tokio::spawn(async move {
        loop {
            let backoff = match control_plane.open_event_stream().await {
                Ok(mut rx) => {
                    while let Some(event) = rx.recv().await {
                        if let Err(err) = ctx.handle_sse_event(event.event, event.data).await {
                            tracing::warn!(error = %err, "failed to handle SSE event");
                        }
                    }
                    Duration::from_secs(5)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to open SSE stream");
                    Duration::from_secs(30)
                }
            };
            tokio::time::sleep(backoff).await;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_contract_json(id: &str, tenant: &str) -> serde_json::Value {
        serde_json::json!({
            "contract_id": id,
            "tenant_id": tenant,
            "version": "1",
            "status": "active",
            "guardrails": [],
            "thresholds": {},
            "failover_profile": "strict",
            "suite": "S0",
            "backend_url": null,
            "issued_at": Utc::now().to_rfc3339(),
            "expires_at": (Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
            "policy_digest": "",
        })
    }

    fn context() -> LoaderContext {
        LoaderContext::new(Arc::new(ContractStore::new()), Arc::new(RuntimeBindingTable::new()), Arc::new(GuardrailRegistry::with_builtins()))
    }

    #[test]
    fn applies_enforceable_contract_and_binds_it() {
        let ctx = context();
        let loaded = ctx.apply_contract_json(sample_contract_json("hc-v1", "acme")).unwrap();
        assert!(loaded);
        let key = TenantScopeKey::new("acme", "hc-v1");
        assert!(ctx.bindings.get(&key).is_some());
        assert!(ctx.store.get(&key).is_some());
    }

    #[test]
    fn skips_expired_contract() {
        let ctx = context();
        let mut raw = sample_contract_json("hc-v1", "acme");
        raw["expires_at"] = serde_json::json!((Utc::now() - chrono::Duration::hours(1)).to_rfc3339());
        let loaded = ctx.apply_contract_json(raw).unwrap();
        assert!(!loaded);
    }

    #[test]
    fn reapplying_the_same_contract_is_idempotent() {
        let ctx = context();
        ctx.apply_contract_json(sample_contract_json("hc-v1", "acme")).unwrap();
        ctx.apply_contract_json(sample_contract_json("hc-v1", "acme")).unwrap();
        assert_eq!(ctx.bindings.len(), 1);
    }

    #[tokio::test]
    async fn cold_load_without_cache_falls_back_to_pull() {
        let ctx = context();
        let loaded = ctx.cold_load().await.unwrap();
        assert_eq!(loaded, 0);
    }

    #[tokio::test]
    async fn cold_load_reads_both_key_forms_from_cache() {
        use crate::cache::{CacheBackend, InMemoryCacheBackend};
        let backend: Arc<dyn CacheBackend> = Arc::new(InMemoryCacheBackend::new());
        backend.set("tenant:acme:contract:hc-v1", &sample_contract_json("hc-v1", "acme").to_string()).await.unwrap();

        let ctx = context().with_cache(backend);
        let loaded = ctx.cold_load().await.unwrap();
        assert_eq!(loaded, 1);
    }
}
