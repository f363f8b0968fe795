use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use keepsake_snapshot::Snapshot;

use crate::error::CacheResult;
use crate::key::CacheKey;
use crate::traits::CacheStore;

/// In-memory, HashMap-based snapshot store.
///
/// Intended for tests and embedding. Entries sit behind a `RwLock`; reads
/// hand out clones of the `Arc`, never copies of the snapshot.
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, Arc<Snapshot>>>,
}

impl InMemoryCacheStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached snapshots.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }

    /// Sorted list of all keys.
    pub fn keys(&self) -> Vec<CacheKey> {
        let map = self.entries.read().expect("lock poisoned");
        let mut keys: Vec<CacheKey> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<Arc<Snapshot>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: CacheKey, snapshot: Arc<Snapshot>) -> CacheResult<Option<Arc<Snapshot>>> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.insert(key, snapshot))
    }

    fn evict(&self, key: &CacheKey) -> CacheResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCacheStore")
            .field("entry_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_snapshot::SnapshotBuilder;
    use keepsake_state::{FieldValue, ManagedInstance};
    use keepsake_types::{ClassDescriptor, FieldDescriptor, FieldType, Identity};

    fn snapshot(value: i32) -> Arc<Snapshot> {
        let class = ClassDescriptor::builder("a.B")
            .field(FieldDescriptor::new("x", FieldType::Int))
            .build()
            .unwrap();
        let mut instance = ManagedInstance::new(class);
        instance.store_field(0, FieldValue::Int(value)).unwrap();
        Arc::new(SnapshotBuilder::default().build(&instance))
    }

    fn key(n: i64) -> CacheKey {
        CacheKey::new("a.B", Identity::datastore("a.B", n))
    }

    #[test]
    fn put_get_evict() {
        let store = InMemoryCacheStore::new();
        assert!(store.is_empty());
        assert!(store.put(key(1), snapshot(10)).unwrap().is_none());
        assert!(store.contains(&key(1)).unwrap());
        assert_eq!(store.get(&key(1)).unwrap(), Some(snapshot(10)));

        let replaced = store.put(key(1), snapshot(11)).unwrap();
        assert_eq!(replaced, Some(snapshot(10)));
        assert_eq!(store.len(), 1);

        assert!(store.evict(&key(1)).unwrap());
        assert!(!store.evict(&key(1)).unwrap());
        assert!(store.get(&key(1)).unwrap().is_none());
    }

    #[test]
    fn batch_lookup_preserves_order() {
        let store = InMemoryCacheStore::new();
        store.put(key(2), snapshot(2)).unwrap();
        let results = store.get_batch(&[key(1), key(2)]).unwrap();
        assert!(results[0].is_none());
        assert_eq!(results[1], Some(snapshot(2)));
    }

    #[test]
    fn keys_are_sorted() {
        let store = InMemoryCacheStore::new();
        store.put(key(3), snapshot(3)).unwrap();
        store.put(key(1), snapshot(1)).unwrap();
        assert_eq!(store.keys(), vec![key(1), key(3)]);
        store.clear();
        assert!(store.is_empty());
    }
}
