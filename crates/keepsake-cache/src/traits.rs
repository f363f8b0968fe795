use std::sync::Arc;

use keepsake_snapshot::Snapshot;

use crate::error::CacheResult;
use crate::key::CacheKey;

/// Keyed store of immutable snapshots.
///
/// Implementations must be safe for concurrent use. Snapshots are never
/// modified once stored; `put` replaces the whole entry.
pub trait CacheStore: Send + Sync {
    /// Snapshot stored under `key`, or `Ok(None)` on a miss.
    fn get(&self, key: &CacheKey) -> CacheResult<Option<Arc<Snapshot>>>;

    /// Store `snapshot` under `key`, returning the snapshot it replaced.
    fn put(&self, key: CacheKey, snapshot: Arc<Snapshot>) -> CacheResult<Option<Arc<Snapshot>>>;

    /// Remove the entry for `key`. Returns `true` if it existed.
    fn evict(&self, key: &CacheKey) -> CacheResult<bool>;

    fn contains(&self, key: &CacheKey) -> CacheResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Look up several keys.
    ///
    /// Default implementation calls `get()` for each key.
    fn get_batch(&self, keys: &[CacheKey]) -> CacheResult<Vec<Option<Arc<Snapshot>>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }
}
