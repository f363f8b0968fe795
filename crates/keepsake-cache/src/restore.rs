use std::collections::HashMap;
use std::sync::Arc;

use keepsake_snapshot::{CachedValue, Snapshot};
use keepsake_state::{
    CollectionValue, DetachedState, FieldValue, InstanceRef, ManagedInstance, MapValue, Shared,
};
use keepsake_types::{ClassDescriptor, FieldBitSet, Identity, IdentityPlaceholder};
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// Turns identity placeholders back into live references.
pub trait IdentityResolver {
    /// The instance a placeholder stands for, if it can be found.
    fn resolve(&self, placeholder: &IdentityPlaceholder) -> Option<InstanceRef>;
}

impl IdentityResolver for HashMap<Identity, InstanceRef> {
    fn resolve(&self, placeholder: &IdentityPlaceholder) -> Option<InstanceRef> {
        self.get(placeholder.identity()).cloned()
    }
}

/// A restored instance and the fields that were restored.
#[derive(Debug)]
pub struct Restored {
    pub instance: ManagedInstance,
    pub loaded: FieldBitSet,
}

/// Copies snapshots back into fresh, detached instances.
///
/// Every mutable value gets a new cell, so the restored instance can be
/// modified without affecting the snapshot. A placeholder the resolver cannot
/// resolve leaves its field unloaded.
pub struct SnapshotRestorer<'a> {
    resolver: &'a dyn IdentityResolver,
}

impl<'a> SnapshotRestorer<'a> {
    /// Create a restorer resolving placeholders through `resolver`.
    pub fn new(resolver: &'a dyn IdentityResolver) -> Self {
        Self { resolver }
    }

    /// Restore into an instance of the class the snapshot was taken from.
    pub fn restore(&self, snapshot: &Snapshot) -> Restored {
        self.fill(snapshot, Arc::clone(snapshot.class()), None)
    }

    /// Restore into an instance of `class`, tagging it with `identity`.
    ///
    /// Fails with [`CacheError::StaleSnapshot`] if `class` no longer has the
    /// layout the snapshot was taken against.
    pub fn restore_as(
        &self,
        snapshot: &Snapshot,
        class: &Arc<ClassDescriptor>,
        identity: Option<Identity>,
    ) -> CacheResult<Restored> {
        if class.name() != snapshot.class_name() || class.field_count() != snapshot.field_count() {
            return Err(CacheError::StaleSnapshot {
                class: class.name().to_owned(),
                cached: snapshot.field_count(),
                current: class.field_count(),
            });
        }
        Ok(self.fill(snapshot, Arc::clone(class), identity))
    }

    fn fill(
        &self,
        snapshot: &Snapshot,
        class: Arc<ClassDescriptor>,
        identity: Option<Identity>,
    ) -> Restored {
        let mut instance = ManagedInstance::new(Arc::clone(&class));
        let mut loaded = FieldBitSet::new(class.field_count());
        for (index, cached) in snapshot.loaded_values() {
            let Some(value) = self.value(cached) else {
                debug!(
                    class = class.name(),
                    field = index,
                    "unresolvable cached value; field left unloaded"
                );
                continue;
            };
            match instance.store_field(index, value) {
                Ok(()) => {
                    loaded.insert(index);
                }
                Err(e) => debug!(class = class.name(), error = %e, "cached value rejected"),
            }
        }

        let mut state = DetachedState::new(loaded.clone());
        if let Some(identity) = identity {
            state = state.with_identity(identity);
        }
        if let Some(version) = snapshot.version() {
            state = state.with_version(version);
        }
        Restored {
            instance: instance.with_detached_state(state),
            loaded,
        }
    }

    fn value(&self, cached: &CachedValue) -> Option<FieldValue> {
        Some(match cached {
            CachedValue::Null => FieldValue::Null,
            CachedValue::Bool(v) => FieldValue::Bool(*v),
            CachedValue::Char(v) => FieldValue::Char(*v),
            CachedValue::Byte(v) => FieldValue::Byte(*v),
            CachedValue::Short(v) => FieldValue::Short(*v),
            CachedValue::Int(v) => FieldValue::Int(*v),
            CachedValue::Long(v) => FieldValue::Long(*v),
            CachedValue::Float(v) => FieldValue::Float(*v),
            CachedValue::Double(v) => FieldValue::Double(*v),
            CachedValue::Str(v) => FieldValue::Str(v.clone()),
            CachedValue::Date(v) => FieldValue::date(*v),
            CachedValue::Text(v) => FieldValue::text_buffer(v.clone()),
            CachedValue::Identity(placeholder) => FieldValue::Ref(self.resolver.resolve(placeholder)?),
            CachedValue::Nested(nested) => {
                FieldValue::Ref(InstanceRef::new(self.restore(nested).instance))
            }
            CachedValue::Collection(collection) => {
                let elements = collection
                    .iter()
                    .map(|e| self.value(e))
                    .collect::<Option<Vec<_>>>()?;
                FieldValue::Collection(Shared::new(CollectionValue::with_elements(
                    collection.ty().clone(),
                    elements,
                )))
            }
            CachedValue::Map(map) => {
                let entries = map
                    .entries()
                    .iter()
                    .map(|(k, v)| Some((self.value(k)?, self.value(v)?)))
                    .collect::<Option<Vec<_>>>()?;
                FieldValue::Map(Shared::new(MapValue::with_entries(map.ty().clone(), entries)))
            }
            CachedValue::Array(elements) => FieldValue::Array(Shared::new(
                elements
                    .iter()
                    .map(|e| self.value(e))
                    .collect::<Option<Vec<_>>>()?,
            )),
            CachedValue::SharedCollection(handle) => {
                let live = handle.try_read()?;
                FieldValue::Collection(Shared::new(CollectionValue::with_elements(
                    live.ty().clone(),
                    live.iter().map(fresh_copy),
                )))
            }
            CachedValue::SharedMap(handle) => {
                let live = handle.try_read()?;
                FieldValue::Map(Shared::new(MapValue::with_entries(
                    live.ty().clone(),
                    live.entries().iter().map(|(k, v)| (fresh_copy(k), fresh_copy(v))),
                )))
            }
            CachedValue::SharedArray(handle) => {
                FieldValue::Array(Shared::new(handle.try_read()?.iter().map(fresh_copy).collect()))
            }
            CachedValue::Opaque(opaque) => FieldValue::Opaque(opaque.clone()),
        })
    }
}

/// Copy of a plain value with a new cell for every mutable part.
fn fresh_copy(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Date(cell) => FieldValue::date(cell.get()),
        FieldValue::TextBuffer(cell) => FieldValue::text_buffer(cell.get()),
        FieldValue::Collection(cell) => {
            let live = cell.read();
            FieldValue::Collection(Shared::new(CollectionValue::with_elements(
                live.ty().clone(),
                live.iter().map(fresh_copy),
            )))
        }
        FieldValue::Map(cell) => {
            let live = cell.read();
            FieldValue::Map(Shared::new(MapValue::with_entries(
                live.ty().clone(),
                live.entries().iter().map(|(k, v)| (fresh_copy(k), fresh_copy(v))),
            )))
        }
        FieldValue::Array(cell) => {
            FieldValue::Array(Shared::new(cell.read().iter().map(fresh_copy).collect()))
        }
        other => other.clone(),
    }
}
