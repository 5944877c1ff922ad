//! Contract and guardrail loader channels.
//!
//! Five coexisting channels keep the runtime binding table fresh: a cold
//! scan of the cache at boot, a periodic HTTP pull, a cache pub/sub push,
//! a long-lived SSE push, and a webhook endpoint. All five funnel through
//! [`loader::LoaderContext::apply_contract_json`], so idempotent loading
//! (see `acvps-contracts`) absorbs duplicate or out-of-order deliveries.
//! A separate [`guardrail_source`] module sources per-tenant dynamic
//! guardrail configs from a remote repository.

pub mod cache;
pub mod control_plane;
pub mod error;
pub mod guardrail_source;
pub mod loader;
pub mod netguard;
pub mod schema;
pub mod sse;
pub mod webhook;

pub use cache::{CacheBackend, InMemoryCacheBackend, SharedCacheBackend};
pub use control_plane::ControlPlaneClient;
pub use error::{LoaderError, Result};
pub use guardrail_source::{RemoteRepoSource, TenantGuardrailCache};
pub use loader::{spawn_periodic_pull, spawn_pubsub_listener, spawn_sse_listener, LoaderContext};

#[cfg(feature = "redis-backend")]
pub use cache::RedisCacheBackend;
