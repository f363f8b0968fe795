use std::sync::Arc;

use chrono::{DateTime, Utc};
use keepsake_state::{CollectionValue, FieldValue, MapValue, OpaqueRef, Shared};
use keepsake_types::{ClassDescriptor, FieldBitSet, IdentityPlaceholder, Version};

/// A field value as stored in a snapshot.
///
/// Mutable live values (dates, text buffers) are copied. Persistable
/// references are placeholders or nested snapshots. Containers of persistable
/// objects are rebuilt from cached values; containers of plain values are
/// shared with the live instance.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue {
    Null,
    Bool(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Date(DateTime<Utc>),
    Text(String),
    Identity(IdentityPlaceholder),
    Nested(Arc<Snapshot>),
    Collection(CollectionValue<CachedValue>),
    Map(MapValue<CachedValue, CachedValue>),
    Array(Vec<CachedValue>),
    SharedCollection(Shared<CollectionValue>),
    SharedMap(Shared<MapValue>),
    SharedArray(Shared<Vec<FieldValue>>),
    Opaque(OpaqueRef),
}

impl CachedValue {
    /// Returns `true` for a cached null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The placeholder, if this value stands for a reference.
    pub fn as_placeholder(&self) -> Option<&IdentityPlaceholder> {
        match self {
            Self::Identity(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    /// The nested snapshot of an embedded object.
    pub fn as_nested(&self) -> Option<&Snapshot> {
        match self {
            Self::Nested(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Immutable copy of the loaded fields of one instance.
///
/// Values line up with the absolute fields of the class. A field whose loaded
/// bit is clear holds [`CachedValue::Null`] and must not be used.
#[derive(Clone, Debug)]
pub struct Snapshot {
    class: Arc<ClassDescriptor>,
    values: Vec<CachedValue>,
    loaded: FieldBitSet,
    version: Option<Version>,
}

impl Snapshot {
    pub(crate) fn new(
        class: Arc<ClassDescriptor>,
        values: Vec<CachedValue>,
        loaded: FieldBitSet,
        version: Option<Version>,
    ) -> Self {
        Self {
            class,
            values,
            loaded,
            version,
        }
    }

    /// Class the snapshot was taken from.
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Name of the class the snapshot was taken from.
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Number of fields, loaded or not.
    pub fn field_count(&self) -> usize {
        self.values.len()
    }

    /// Cached value of a loaded field.
    pub fn get(&self, index: usize) -> Option<&CachedValue> {
        self.is_loaded(index).then(|| &self.values[index])
    }

    /// Returns `true` if field `index` was captured.
    pub fn is_loaded(&self, index: usize) -> bool {
        index < self.values.len() && self.loaded.contains(index)
    }

    /// Captured fields.
    pub fn loaded(&self) -> &FieldBitSet {
        &self.loaded
    }

    /// Version of the instance when the snapshot was taken. Nested snapshots
    /// carry none.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Loaded fields and their values, in absolute order.
    pub fn loaded_values(&self) -> impl Iterator<Item = (usize, &CachedValue)> + '_ {
        self.loaded.iter().map(move |index| (index, &self.values[index]))
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.class, &other.class) || self.class == other.class)
            && self.values == other.values
            && self.loaded == other.loaded
            && self.version == other.version
    }
}
