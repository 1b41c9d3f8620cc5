//! Persisted-state layout (spec.md §6, logical): `blocks`, `state`,
//! `meta`, `activation_ledger`, `reputation`. A concrete storage engine
//! is an explicit non-goal, so this crate defines the trait boundary and
//! a bookkeeping in-memory implementation for tests and composition-root
//! wiring; a real deployment supplies its own `Store` (the teacher wires
//! `rocksdb` behind an equivalent boundary in `storage.rs`).

use dashmap::DashMap;
use std::sync::Arc;

pub trait Store: Send + Sync {
    fn get(&self, namespace: &str, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&self, namespace: &str, key: &[u8], value: &[u8]);
    /// All values whose key starts with `prefix`, in unspecified order.
    fn scan_prefix(&self, namespace: &str, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
    /// Append-only log write (e.g. used-proof sets, reputation event ids).
    fn append(&self, namespace: &str, entry: &[u8]);
}

#[derive(Default)]
pub struct InMemoryStore {
    maps: DashMap<String, DashMap<Vec<u8>, Vec<u8>>>,
    logs: DashMap<String, parking_lot::RwLock<Vec<Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Store for InMemoryStore {
    fn get(&self, namespace: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.maps.get(namespace)?.get(key).map(|v| v.clone())
    }

    fn put(&self, namespace: &str, key: &[u8], value: &[u8]) {
        self.maps
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
    }

    fn scan_prefix(&self, namespace: &str, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        match self.maps.get(namespace) {
            Some(map) => map
                .iter()
                .filter(|entry| entry.key().starts_with(prefix))
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            None => vec![],
        }
    }

    fn append(&self, namespace: &str, entry: &[u8]) {
        self.logs
            .entry(namespace.to_string())
            .or_default()
            .write()
            .push(entry.to_vec());
    }
}

/// Canonical namespace names, spec.md §6.
pub mod namespaces {
    pub const BLOCKS: &str = "blocks";
    pub const STATE: &str = "state";
    pub const META: &str = "meta";
    pub const ACTIVATION_LEDGER: &str = "activation_ledger";
    pub const REPUTATION: &str = "reputation";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryStore::new();
        store.put(namespaces::META, b"height", b"42");
        assert_eq!(store.get(namespaces::META, b"height"), Some(b"42".to_vec()));
    }

    #[test]
    fn scan_prefix_filters_by_namespace_and_key() {
        let store = InMemoryStore::new();
        store.put(namespaces::BLOCKS, b"micro:0001", b"a");
        store.put(namespaces::BLOCKS, b"micro:0002", b"b");
        store.put(namespaces::BLOCKS, b"macro:0001", b"c");
        let results = store.scan_prefix(namespaces::BLOCKS, b"micro:");
        assert_eq!(results.len(), 2);
    }
}
