//! Live field values.
//!
//! Scalars and strings are held by value. Dates, text buffers, collections,
//! maps, and arrays are *shared handles*: cloning a [`FieldValue`] of those
//! kinds copies the reference, not the contents, so two holders observe each
//! other's mutations. Anything that must not observe later mutations has to
//! copy the contents explicitly.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use keepsake_types::FieldType;

use crate::instance::InstanceRef;

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Shared, mutable cell.
///
/// Equality compares contents, so two distinct cells holding equal values are
/// equal. Use [`ptr_eq`](Self::ptr_eq) to test for the same cell.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    /// Wrap `value` in a new cell.
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Lock the cell for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().expect("lock poisoned")
    }

    /// Lock the cell for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().expect("lock poisoned")
    }

    /// Read without blocking. Returns `None` if a writer holds the cell.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.0.try_read().ok()
    }

    /// Returns `true` if both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> Shared<T> {
    /// Clone of the current contents.
    pub fn get(&self) -> T {
        self.read().clone()
    }

    /// A new cell holding a copy of the current contents.
    pub fn deep_copy(&self) -> Self {
        Self::new(self.get())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.read() == *other.read()
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read() {
            Some(value) => f.debug_tuple("Shared").field(&*value).finish(),
            None => f.write_str("Shared(<locked>)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Runtime type of a collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CollectionType {
    /// Known only through an interface; no concrete type to instantiate.
    Abstract,
    Vec,
    VecDeque,
    HashSet,
    BTreeSet,
    /// Application-defined collection type.
    Named(String),
}

impl CollectionType {
    /// Returns `true` for a declared interface type with no concrete class.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Abstract)
    }

    /// Returns `true` for ordered, duplicate-permitting types.
    pub fn is_list_like(&self) -> bool {
        matches!(self, Self::Vec | Self::VecDeque)
    }

    /// Returns `true` for types that reject duplicate elements.
    pub fn is_set_like(&self) -> bool {
        matches!(self, Self::HashSet | Self::BTreeSet)
    }

    /// Name of the collection type.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Abstract => "Collection",
            Self::Vec => "Vec",
            Self::VecDeque => "VecDeque",
            Self::HashSet => "HashSet",
            Self::BTreeSet => "BTreeSet",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Collection contents tagged with their runtime type.
///
/// Elements are only `PartialEq` (floats and shared cells have no hash), so
/// set-like inserts scan the elements and filling a set of `n` is O(n²).
#[derive(Clone, Debug, PartialEq)]
pub struct CollectionValue<V = FieldValue> {
    ty: CollectionType,
    elements: Vec<V>,
}

impl<V: PartialEq> CollectionValue<V> {
    /// Empty collection of type `ty`.
    pub fn new(ty: CollectionType) -> Self {
        Self {
            ty,
            elements: Vec::new(),
        }
    }

    /// Collect `elements`, applying set semantics for set-like types.
    pub fn with_elements(ty: CollectionType, elements: impl IntoIterator<Item = V>) -> Self {
        let mut collection = Self::new(ty);
        for element in elements {
            collection.insert(element);
        }
        collection
    }

    /// Add an element. Returns `false` if a set-like collection already held it.
    pub fn insert(&mut self, element: V) -> bool {
        if self.ty.is_set_like() && self.elements.contains(&element) {
            return false;
        }
        self.elements.push(element);
        true
    }

    /// Runtime type of the collection.
    pub fn ty(&self) -> &CollectionType {
        &self.ty
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> &[V] {
        &self.elements
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.elements.iter()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the collection has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Runtime type of a map.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapType {
    Abstract,
    HashMap,
    BTreeMap,
    Named(String),
}

impl MapType {
    /// Returns `true` for a declared interface type with no concrete class.
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Abstract)
    }

    /// Name of the map type.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Abstract => "Map",
            Self::HashMap => "HashMap",
            Self::BTreeMap => "BTreeMap",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Map entries tagged with their runtime type. Keys are unique.
///
/// Keys are only `PartialEq`, so lookups and inserts scan the entries.
#[derive(Clone, Debug, PartialEq)]
pub struct MapValue<K = FieldValue, V = FieldValue> {
    ty: MapType,
    entries: Vec<(K, V)>,
}

impl<K: PartialEq, V> MapValue<K, V> {
    /// Empty map of type `ty`.
    pub fn new(ty: MapType) -> Self {
        Self {
            ty,
            entries: Vec::new(),
        }
    }

    /// Map of type `ty` holding `entries`; later keys replace earlier ones.
    pub fn with_entries(ty: MapType, entries: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut map = Self::new(ty);
        for (key, value) in entries {
            map.insert(key, value);
        }
        map
    }

    /// Insert or replace, returning the replaced value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Runtime type of the map.
    pub fn ty(&self) -> &MapType {
        &self.ty
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(K, V)] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tracked
// ---------------------------------------------------------------------------

/// Lazy-loading wrapper installed by the runtime around a field value.
///
/// The wrapped backing value is only meaningful once the wrapper reports its
/// contents loaded. Cloning shares the wrapper.
#[derive(Clone)]
pub struct Tracked {
    inner: Arc<TrackedInner>,
}

struct TrackedInner {
    loaded: AtomicBool,
    backing: FieldValue,
}

impl Tracked {
    /// Wrapper whose contents are already loaded.
    pub fn loaded(backing: FieldValue) -> Self {
        Self::with_state(backing, true)
    }

    /// Wrapper whose contents still have to be fetched.
    pub fn unloaded(backing: FieldValue) -> Self {
        Self::with_state(backing, false)
    }

    fn with_state(backing: FieldValue, loaded: bool) -> Self {
        Self {
            inner: Arc::new(TrackedInner {
                loaded: AtomicBool::new(loaded),
                backing,
            }),
        }
    }

    /// Returns `true` once the backing container has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    /// Mark the backing container as loaded.
    pub fn mark_loaded(&self) {
        self.inner.loaded.store(true, Ordering::Release);
    }

    /// The wrapped value, loaded or not.
    pub fn backing(&self) -> &FieldValue {
        &self.inner.backing
    }

    /// Returns `true` if both wrappers share one backing container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("loaded", &self.is_loaded())
            .field("backing", self.backing())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// OpaqueRef
// ---------------------------------------------------------------------------

/// Reference to an application value the runtime does not interpret.
#[derive(Clone)]
pub struct OpaqueRef {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueRef {
    /// Wrap `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// Type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The wrapped value, if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Returns `true` if both handles share one value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueRef({})", self.type_name)
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// Any value a managed field may hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FieldValue {
    #[default]
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
    /// Mutable date-time value.
    Date(Shared<DateTime<Utc>>),
    /// Growable, mutable text.
    TextBuffer(Shared<String>),
    /// Reference to another persistable instance.
    Ref(InstanceRef),
    Collection(Shared<CollectionValue>),
    Map(Shared<MapValue>),
    Array(Shared<Vec<FieldValue>>),
    /// Value behind a lazy-loading wrapper.
    Tracked(Tracked),
    Opaque(OpaqueRef),
}

impl FieldValue {
    /// Initial slot value for a field of `field_type`.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Self::Bool(false),
            FieldType::Char => Self::Char('\0'),
            FieldType::Byte => Self::Byte(0),
            FieldType::Short => Self::Short(0),
            FieldType::Int => Self::Int(0),
            FieldType::Long => Self::Long(0),
            FieldType::Float => Self::Float(0.0),
            FieldType::Double => Self::Double(0.0),
            FieldType::String | FieldType::Object => Self::Null,
        }
    }

    /// A date value in a new cell.
    pub fn date(value: DateTime<Utc>) -> Self {
        Self::Date(Shared::new(value))
    }

    /// A growable text buffer in a new cell.
    pub fn text_buffer(value: impl Into<String>) -> Self {
        Self::TextBuffer(Shared::new(value.into()))
    }

    /// A collection of type `ty` in a new cell.
    pub fn collection(ty: CollectionType, elements: impl IntoIterator<Item = FieldValue>) -> Self {
        Self::Collection(Shared::new(CollectionValue::with_elements(ty, elements)))
    }

    /// A map of type `ty` in a new cell.
    pub fn map(
        ty: MapType,
        entries: impl IntoIterator<Item = (FieldValue, FieldValue)>,
    ) -> Self {
        Self::Map(Shared::new(MapValue::with_entries(ty, entries)))
    }

    /// An array in a new cell.
    pub fn array(elements: impl IntoIterator<Item = FieldValue>) -> Self {
        Self::Array(Shared::new(elements.into_iter().collect()))
    }

    /// Returns `true` for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the value may be stored in a field of `field_type`.
    pub fn fits(&self, field_type: FieldType) -> bool {
        match field_type {
            FieldType::Boolean => matches!(self, Self::Bool(_)),
            FieldType::Char => matches!(self, Self::Char(_)),
            FieldType::Byte => matches!(self, Self::Byte(_)),
            FieldType::Short => matches!(self, Self::Short(_)),
            FieldType::Int => matches!(self, Self::Int(_)),
            FieldType::Long => matches!(self, Self::Long(_)),
            FieldType::Float => matches!(self, Self::Float(_)),
            FieldType::Double => matches!(self, Self::Double(_)),
            FieldType::String => matches!(self, Self::Str(_) | Self::Null),
            FieldType::Object => true,
        }
    }

    /// Short name of the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Char(_) => "char",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Date(_) => "date",
            Self::TextBuffer(_) => "text buffer",
            Self::Ref(_) => "reference",
            Self::Collection(_) => "collection",
            Self::Map(_) => "map",
            Self::Array(_) => "array",
            Self::Tracked(_) => "tracked",
            Self::Opaque(_) => "opaque",
        }
    }

    /// The string of a string field; `None` for null or any other kind.
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The referenced instance, if this is a reference.
    pub fn as_instance(&self) -> Option<&InstanceRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Str)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<InstanceRef> for FieldValue {
    fn from(value: InstanceRef) -> Self {
        Self::Ref(value)
    }
}

macro_rules! field_value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

field_value_from! {
    bool => Bool,
    char => Char,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => Str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_clone_aliases_and_deep_copy_detaches() {
        let original = Shared::new(String::from("abc"));
        let alias = original.clone();
        let copy = original.deep_copy();
        original.write().push('d');
        assert_eq!(*alias.read(), "abcd");
        assert_eq!(*copy.read(), "abc");
        assert!(alias.ptr_eq(&original));
        assert!(!copy.ptr_eq(&original));
    }

    #[test]
    fn shared_equality_compares_contents() {
        assert_eq!(Shared::new(3), Shared::new(3));
        assert_ne!(Shared::new(3), Shared::new(4));
    }

    #[test]
    fn set_like_collections_reject_duplicates() {
        let mut set = CollectionValue::new(CollectionType::HashSet);
        assert!(set.insert(FieldValue::Int(1)));
        assert!(!set.insert(FieldValue::Int(1)));
        assert!(set.insert(FieldValue::Null));
        assert_eq!(set.len(), 2);

        let list = CollectionValue::with_elements(
            CollectionType::Vec,
            [FieldValue::Int(1), FieldValue::Int(1)],
        );
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn map_insert_replaces() {
        let mut map = MapValue::new(MapType::HashMap);
        assert!(map.insert(FieldValue::from("a"), FieldValue::Int(1)).is_none());
        assert_eq!(
            map.insert(FieldValue::from("a"), FieldValue::Int(2)),
            Some(FieldValue::Int(1))
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&FieldValue::from("a")), Some(&FieldValue::Int(2)));
    }

    #[test]
    fn tracked_state() {
        let tracked = Tracked::unloaded(FieldValue::collection(CollectionType::Vec, []));
        assert!(!tracked.is_loaded());
        let alias = tracked.clone();
        tracked.mark_loaded();
        assert!(alias.is_loaded());
        assert_eq!(alias, tracked);
    }

    #[test]
    fn fits_declared_type() {
        assert!(FieldValue::Int(1).fits(FieldType::Int));
        assert!(!FieldValue::Long(1).fits(FieldType::Int));
        assert!(!FieldValue::Null.fits(FieldType::Boolean));
        assert!(FieldValue::Null.fits(FieldType::String));
        assert!(FieldValue::from("x").fits(FieldType::String));
        assert!(FieldValue::array([]).fits(FieldType::Object));
    }

    #[test]
    fn defaults_fit_their_type() {
        for ty in [
            FieldType::Boolean,
            FieldType::Char,
            FieldType::Byte,
            FieldType::Short,
            FieldType::Int,
            FieldType::Long,
            FieldType::Float,
            FieldType::Double,
            FieldType::String,
            FieldType::Object,
        ] {
            assert!(FieldValue::default_for(ty).fits(ty), "{ty}");
        }
    }

    #[test]
    fn opaque_downcast() {
        let opaque = OpaqueRef::new(42u32);
        assert_eq!(opaque.downcast_ref::<u32>(), Some(&42));
        assert!(opaque.downcast_ref::<i64>().is_none());
        assert!(opaque.type_name().contains("u32"));
    }
}
