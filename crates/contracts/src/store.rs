//! The contract store: an in-process map from tenant-namespaced key to
//! the contract's raw JSON, with hit/miss counters and no eviction
//! policy beyond explicit delete.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use acvps_core::key::TenantScopeKey;

/// Reader-writer-locked raw contract store. Both wire key forms are
/// tried on every read; writes land under whichever form the caller
/// supplies (loaders deliberately write both).
pub struct ContractStore {
    entries: RwLock<HashMap<String, String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContractStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Store `contract_json` under the given raw wire-form key exactly
    /// as supplied.
    pub fn put_raw(&self, raw_key: impl Into<String>, contract_json: impl Into<String>) {
        self.entries.write().expect("contract store lock poisoned").insert(raw_key.into(), contract_json.into());
    }

    /// Store under both wire forms, as loaders do.
    pub fn put_both_forms(&self, key: &TenantScopeKey, contract_json: impl Into<String>) {
        let json = contract_json.into();
        self.put_raw(key.runtime_form(), json.clone());
        self.put_raw(key.loader_form(), json);
    }

    /// Try both key forms; the first hit wins.
    pub fn get(&self, key: &TenantScopeKey) -> Option<String> {
        let entries = self.entries.read().expect("contract store lock poisoned");
        let found = entries.get(&key.runtime_form()).or_else(|| entries.get(&key.loader_form())).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Remove both wire forms for `key`. Returns true if either was present.
    pub fn delete(&self, key: &TenantScopeKey) -> bool {
        let mut entries = self.entries.write().expect("contract store lock poisoned");
        let a = entries.remove(&key.runtime_form()).is_some();
        let b = entries.remove(&key.loader_form()).is_some();
        a || b
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("contract store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ContractStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_tries_both_key_forms() {
        let store = ContractStore::new();
        let key = TenantScopeKey::new("acme", "hc-v1");
        store.put_raw(key.loader_form(), "{\"contract_id\":\"hc-v1\"}");

        assert_eq!(store.get(&key), Some("{\"contract_id\":\"hc-v1\"}".to_string()));
        assert_eq!(store.hit_count(), 1);
    }

    #[test]
    fn miss_increments_counter() {
        let store = ContractStore::new();
        let key = TenantScopeKey::new("acme", "missing");
        assert_eq!(store.get(&key), None);
        assert_eq!(store.miss_count(), 1);
    }

    #[test]
    fn put_both_forms_is_readable_either_way() {
        let store = ContractStore::new();
        let key = TenantScopeKey::new("acme", "hc-v1");
        store.put_both_forms(&key, "{}");
        assert_eq!(store.len(), 2);
        assert!(store.get(&key).is_some());
    }

    #[test]
    fn delete_removes_both_forms() {
        let store = ContractStore::new();
        let key = TenantScopeKey::new("acme", "hc-v1");
        store.put_both_forms(&key, "{}");
        assert!(store.delete(&key));
        assert!(store.is_empty());
    }
}
