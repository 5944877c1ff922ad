//! Tenant-scoped contract keys.
//!
//! Two wire forms appear across the system: the loader/backend form
//! (`tenant:<T>:contract:<C>`) and the runtime/store form
//! (`contract:tenant-<T>:<C>`). Internally we keep a single tagged
//! identifier and only serialize to one form or the other at the IO edge
//! a given caller needs.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScopeKey {
    pub tenant: String,
    pub contract: String,
}

impl TenantScopeKey {
    pub fn new(tenant: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            contract: contract.into(),
        }
    }

    /// The runtime/store key form: `contract:tenant-<T>:<C>`.
    pub fn runtime_form(&self) -> String {
        format!("contract:tenant-{}:{}", self.tenant, self.contract)
    }

    /// The loader/backend key form: `tenant:<T>:contract:<C>`.
    pub fn loader_form(&self) -> String {
        format!("tenant:{}:contract:{}", self.tenant, self.contract)
    }

    /// Parse either wire form back into a tagged key. Returns `None` if the
    /// string matches neither shape.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(rest) = raw.strip_prefix("contract:tenant-") {
            let (tenant, contract) = rest.split_once(':')?;
            return Some(Self::new(tenant, contract));
        }
        if let Some(rest) = raw.strip_prefix("tenant:") {
            let (tenant, rest) = rest.split_once(":contract:")?;
            return Some(Self::new(tenant, rest));
        }
        None
    }
}

impl fmt::Display for TenantScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.runtime_form())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_runtime_form() {
        let key = TenantScopeKey::new("acme", "hc-v1");
        let wire = key.runtime_form();
        assert_eq!(wire, "contract:tenant-acme:hc-v1");
        assert_eq!(TenantScopeKey::parse(&wire), Some(key));
    }

    #[test]
    fn round_trips_loader_form() {
        let key = TenantScopeKey::new("acme", "hc-v1");
        let wire = key.loader_form();
        assert_eq!(wire, "tenant:acme:contract:hc-v1");
        assert_eq!(TenantScopeKey::parse(&wire), Some(key));
    }

    #[test]
    fn rejects_unknown_shape() {
        assert!(TenantScopeKey::parse("garbage").is_none());
    }
}
