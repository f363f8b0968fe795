use std::fmt;
use std::sync::Arc;

use keepsake_snapshot::{Snapshot, SnapshotBuilder};
use keepsake_state::ManagedInstance;
use keepsake_types::{MetadataProvider, MetadataRegistry};
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;
use crate::restore::{IdentityResolver, Restored, SnapshotRestorer};
use crate::traits::CacheStore;

/// Builds, stores, and restores snapshots.
///
/// Snapshots are validated against the metadata registry on the way out: one
/// whose class is no longer registered, or is registered with a different
/// field count, is reported as [`CacheError::StaleSnapshot`]. The entry stays
/// in the store; evicting it is up to the caller.
pub struct SnapshotCache<S> {
    store: S,
    builder: SnapshotBuilder,
    metadata: Arc<MetadataRegistry>,
}

impl<S: CacheStore> SnapshotCache<S> {
    /// Create a cache over `store`, validating against `metadata`.
    pub fn new(store: S, builder: SnapshotBuilder, metadata: Arc<MetadataRegistry>) -> Self {
        Self {
            store,
            builder,
            metadata,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The builder used by [`cache`](Self::cache).
    pub fn builder(&self) -> &SnapshotBuilder {
        &self.builder
    }

    /// Snapshot `instance` and store it under its identity.
    pub fn cache(&self, instance: &ManagedInstance) -> CacheResult<CacheKey> {
        let class_name = instance.class().name();
        let identity = instance
            .identity()
            .ok_or_else(|| CacheError::MissingIdentity {
                class: class_name.to_owned(),
            })?;
        let key = CacheKey::new(class_name, identity);
        let snapshot = self.builder.build(instance);
        self.store.put(key.clone(), Arc::new(snapshot))?;
        debug!(key = %key, "cached snapshot");
        Ok(key)
    }

    /// Stored snapshot for `key`.
    ///
    /// Returns `Ok(None)` on a miss and [`CacheError::StaleSnapshot`] when the
    /// stored snapshot no longer matches its class.
    pub fn get(&self, key: &CacheKey) -> CacheResult<Option<Arc<Snapshot>>> {
        let Some(snapshot) = self.store.get(key)? else {
            return Ok(None);
        };
        if let Err(e) = self.check_current(&snapshot) {
            debug!(key = %key, error = %e, "stale snapshot");
            return Err(e);
        }
        Ok(Some(snapshot))
    }

    /// Restore a fresh detached copy of the object cached under `key`.
    ///
    /// Staleness is reported the same way as by [`get`](Self::get).
    pub fn restore(
        &self,
        key: &CacheKey,
        resolver: &dyn IdentityResolver,
    ) -> CacheResult<Option<Restored>> {
        let Some(snapshot) = self.get(key)? else {
            return Ok(None);
        };
        let class = self
            .metadata
            .class(snapshot.class_name())
            .ok_or_else(|| CacheError::StaleSnapshot {
                class: snapshot.class_name().to_owned(),
                cached: snapshot.field_count(),
                current: 0,
            })?;
        SnapshotRestorer::new(resolver)
            .restore_as(&snapshot, &class, Some(key.identity.clone()))
            .map(Some)
    }

    /// Remove the entry for `key`. Returns `true` if one was stored.
    pub fn evict(&self, key: &CacheKey) -> CacheResult<bool> {
        self.store.evict(key)
    }

    fn check_current(&self, snapshot: &Snapshot) -> CacheResult<()> {
        let current = self
            .metadata
            .class(snapshot.class_name())
            .map(|c| c.field_count());
        if current == Some(snapshot.field_count()) {
            return Ok(());
        }
        Err(CacheError::StaleSnapshot {
            class: snapshot.class_name().to_owned(),
            cached: snapshot.field_count(),
            current: current.unwrap_or(0),
        })
    }
}

impl<S: fmt::Debug> fmt::Debug for SnapshotCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("store", &self.store)
            .field("builder", &self.builder)
            .field("metadata", &self.metadata)
            .finish()
    }
}
