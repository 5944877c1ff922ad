//! API-key authentication and tenant scoping, plus the certificate
//! resolver that lets a client present `X-Certificate-ID` instead of the
//! plain `X-Contract-ID`/`X-DC-Id` pair.
//!
//! Two inbound key shapes are accepted:
//!
//! - `sk-<hex>`: a backend-issued key. Tenant is resolved through the
//!   cache; a cache miss falls back to the hardcoded playground tenant
//!   rather than rejecting the request, since these keys are meant for
//!   quick, unregistered experimentation.
//! - `acvps_{live|test}_sk_<64 hex>`: a legacy key authenticated by
//!   SHA-256 hash lookup against the cache, carrying its own
//!   active/revoked status.
//!
//! When no `X-API-Key` is presented and the gateway is running in local
//! mode, the configured default tenant is used — this is the
//! development posture, not something reachable in `cloud` mode.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use acvps_core::failover::{FailoverProfile, Suite};
use acvps_loaders::ControlPlaneClient;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::GatewayError;
use crate::state::SharedGatewayState;

pub const PLAYGROUND_TENANT_ID: &str = "playground";

#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
}

#[derive(Debug, Deserialize)]
struct LegacyKeyRecord {
    tenant_id: String,
    status: String,
}

fn is_legacy_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("acvps_").and_then(|r| r.strip_prefix("live_sk_").or_else(|| r.strip_prefix("test_sk_"))) else {
        return false;
    };
    rest.len() == 64 && rest.chars().all(|c| c.is_ascii_hexdigit())
}

async fn resolve_tenant_for_key(state: &SharedGatewayState, key: &str) -> Result<String, GatewayError> {
    if let Some(suffix) = key.strip_prefix("sk-") {
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GatewayError::InvalidApiKey);
        }
        if let Some(cache) = &state.cache {
            let cache_key = format!("apikey:{key}");
            if let Ok(Some(tenant_id)) = cache.get(&cache_key).await {
                return Ok(tenant_id);
            }
        }
        return Ok(PLAYGROUND_TENANT_ID.to_string());
    }

    if is_legacy_key(key) {
        let Some(cache) = &state.cache else {
            return Err(GatewayError::InvalidApiKey);
        };
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());
        let cache_key = format!("apikey_hash:{digest}");
        let Some(raw) = cache.get(&cache_key).await.map_err(|_| GatewayError::InvalidApiKey)? else {
            return Err(GatewayError::InvalidApiKey);
        };
        let record: LegacyKeyRecord = serde_json::from_str(&raw).map_err(|_| GatewayError::InvalidApiKey)?;
        if record.status != "active" {
            return Err(GatewayError::InvalidApiKey);
        }
        return Ok(record.tenant_id);
    }

    Err(GatewayError::InvalidApiKey)
}

/// Authenticates `X-API-Key`, resolves the owning tenant, and rejects a
/// mismatched `X-Tenant-ID`. The resolved [`TenantContext`] is inserted
/// into the request extensions for downstream handlers.
pub async fn auth_middleware(State(state): State<SharedGatewayState>, mut request: Request, next: Next) -> Result<Response, GatewayError> {
    let headers = request.headers();
    let api_key = headers.get("X-API-Key").and_then(|v| v.to_str().ok()).map(str::to_string);
    let tenant_header = headers.get("X-Tenant-ID").and_then(|v| v.to_str().ok()).map(str::to_string);

    let tenant_id = match api_key {
        Some(key) => resolve_tenant_for_key(&state, &key).await?,
        None if state.config.mode == acvps_config::GatewayMode::Local => state.config.tenant_id.clone(),
        None => return Err(GatewayError::MissingHeader("X-API-Key")),
    };

    if let Some(claimed) = tenant_header {
        if claimed != tenant_id {
            return Err(GatewayError::TenantMismatch);
        }
    }

    request.extensions_mut().insert(TenantContext { tenant_id });
    Ok(next.run(request).await)
}

/// A certificate is the signed alternative to presenting
/// `X-Contract-ID`/`X-DC-Id`/`X-Target-Endpoint` directly: one opaque id
/// that resolves, through the control plane, to the full binding
/// coordinate. Resolutions are cached for the lifetime of the
/// certificate's own TTL window, capped locally so a long-lived
/// certificate doesn't pin a stale suite/profile forever.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub contract_id: String,
    pub tenant_id: String,
    pub suite: Suite,
    pub failover_profile: FailoverProfile,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CertificateWire {
    contract_id: String,
    tenant_id: String,
    #[serde(default)]
    suite: Suite,
    #[serde(default)]
    failover_profile: FailoverProfile,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

struct CachedCertificate {
    info: CertificateInfo,
    fetched_at: Instant,
}

pub struct CertificateResolver {
    control_plane: Option<Arc<ControlPlaneClient>>,
    local_ttl: Duration,
    entries: RwLock<HashMap<String, CachedCertificate>>,
}

impl CertificateResolver {
    pub fn new(control_plane: Option<Arc<ControlPlaneClient>>, local_ttl: Duration) -> Self {
        Self { control_plane, local_ttl, entries: RwLock::new(HashMap::new()) }
    }

    /// Resolve a certificate id, preferring a fresh local cache entry
    /// over a round trip to the control plane. `None` means the
    /// certificate is missing, expired, or no control plane is
    /// configured to look it up.
    pub async fn resolve(&self, certificate_id: &str) -> Option<CertificateInfo> {
        if let Some(cached) = self.fresh_entry(certificate_id) {
            return Some(cached);
        }

        let control_plane = self.control_plane.as_ref()?;
        let raw = control_plane.get_certificate(certificate_id).await.ok()?;
        let wire: CertificateWire = serde_json::from_value(raw).ok()?;
        if wire.expires_at < Utc::now() {
            return None;
        }

        let info = CertificateInfo {
            contract_id: wire.contract_id,
            tenant_id: wire.tenant_id,
            suite: wire.suite,
            failover_profile: wire.failover_profile,
            issued_at: wire.issued_at,
            expires_at: wire.expires_at,
        };
        self.entries
            .write()
            .expect("certificate cache lock poisoned")
            .insert(certificate_id.to_string(), CachedCertificate { info: info.clone(), fetched_at: Instant::now() });
        Some(info)
    }

    fn fresh_entry(&self, certificate_id: &str) -> Option<CertificateInfo> {
        let entries = self.entries.read().expect("certificate cache lock poisoned");
        let cached = entries.get(certificate_id)?;
        if cached.fetched_at.elapsed() > self.local_ttl || cached.info.expires_at < Utc::now() {
            return None;
        }
        Some(cached.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_legacy_key_shape() {
        let hex64 = "a".repeat(64);
        assert!(is_legacy_key(&format!("acvps_live_sk_{hex64}")));
        assert!(is_legacy_key(&format!("acvps_test_sk_{hex64}")));
        assert!(!is_legacy_key("acvps_live_sk_short"));
        assert!(!is_legacy_key("sk-deadbeef"));
    }

    #[tokio::test]
    async fn resolver_without_control_plane_returns_none_on_miss() {
        let resolver = CertificateResolver::new(None, Duration::from_secs(60));
        assert!(resolver.resolve("cert-1").await.is_none());
    }
}
