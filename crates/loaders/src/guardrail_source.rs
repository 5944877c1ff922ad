//! Multi-tenant guardrail sourcing: per-tenant dynamic guardrail configs
//! pulled from a remote versioned repository, cached for a TTL and
//! namespaced so one tenant's configs never shadow another's.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use acvps_guardrails::{DynamicGuardrailConfig, GuardrailRegistry, Resolved};
use reqwest::Client;

use crate::error::Result;

/// `owner/repo/branch` coordinate for a tenant's guardrail config repo,
/// resolved to the raw file host the way a GitHub raw-content fetch would.
#[derive(Debug, Clone)]
pub struct RemoteRepoSource {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl RemoteRepoSource {
    fn raw_url(&self) -> String {
        format!("https://raw.githubusercontent.com/{}/{}/{}/{}", self.owner, self.repo, self.branch, self.path)
    }
}

struct CacheEntry {
    configs: Vec<DynamicGuardrailConfig>,
    fetched_at: Instant,
}

/// Namespaces each tenant's remote-sourced configs under `tenant:<id>:` so
/// registry ids never collide across tenants, and refuses to shadow any
/// id a platform (built-in) guardrail already owns.
pub struct TenantGuardrailCache {
    client: Client,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl TenantGuardrailCache {
    pub fn new(ttl: Duration) -> Self {
        Self { client: Client::new(), ttl, entries: RwLock::new(HashMap::new()) }
    }

    /// Fetch (or reuse a fresh cache entry for) `tenant`'s guardrail
    /// configs and register any not already present as platform
    /// guardrails. Returns the number of configs newly registered.
    pub async fn refresh(&self, tenant: &str, source: &RemoteRepoSource, registry: &GuardrailRegistry) -> Result<usize> {
        if self.is_fresh(tenant) {
            return Ok(0);
        }

        let response = self.client.get(source.raw_url()).send().await?;
        let configs: Vec<DynamicGuardrailConfig> = response.json().await?;

        let mut registered = 0;
        for config in &configs {
            let namespaced_id = format!("tenant:{tenant}:{}", config.id);
            if matches!(registry.resolve(&namespaced_id), Ok(Resolved::Compiled { .. })) {
                tracing::warn!(tenant, guardrail = %config.id, "platform guardrail takes precedence, tenant config ignored");
                continue;
            }

            let _ = registry.unregister_dynamic(&namespaced_id);
            let mut namespaced = config.clone();
            namespaced.id = namespaced_id;
            if registry.register_dynamic(namespaced).is_ok() {
                registered += 1;
            }
        }

        self.entries.write().expect("guardrail cache lock poisoned").insert(
            tenant.to_string(),
            CacheEntry { configs, fetched_at: Instant::now() },
        );

        Ok(registered)
    }

    fn is_fresh(&self, tenant: &str) -> bool {
        self.entries
            .read()
            .expect("guardrail cache lock poisoned")
            .get(tenant)
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_url_builds_github_raw_path() {
        let source = RemoteRepoSource {
            owner: "acme".into(),
            repo: "guardrails".into(),
            branch: "main".into(),
            path: "configs.json".into(),
        };
        assert_eq!(source.raw_url(), "https://raw.githubusercontent.com/acme/guardrails/main/configs.json");
    }

    #[test]
    fn fresh_cache_is_empty_initially() {
        let cache = TenantGuardrailCache::new(Duration::from_secs(3600));
        assert!(!cache.is_fresh("acme"));
    }
}
