use std::fmt;

use serde::{Deserialize, Serialize};

use crate::strategy::WriteBarrier;

/// Declared type of a managed field.
///
/// Scalar kinds and strings have dedicated exchange operations on the state
/// authority; everything else is exchanged as an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Object,
}

impl FieldType {
    /// Returns `true` for kinds that can never hold null.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::String | Self::Object)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// How the persistence runtime manages a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersistenceModifier {
    /// Stored in the datastore and tracked by the state authority.
    #[default]
    Persistent,
    /// Tracked for transaction rollback but never stored.
    Transactional,
    /// Not managed at all.
    None,
}

/// Storage traits of a container element, map key, or map value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementTraits {
    /// The element type is persistable.
    pub persistent: bool,
    /// Elements are stored embedded in the owner.
    pub embedded: bool,
    /// Elements are stored serialized.
    pub serialized: bool,
}

impl ElementTraits {
    /// Plain (non-persistable) elements.
    pub const VALUE: Self = Self {
        persistent: false,
        embedded: false,
        serialized: false,
    };

    /// Persistable elements stored by reference.
    pub const PERSISTENT: Self = Self {
        persistent: true,
        embedded: false,
        serialized: false,
    };

    /// Mark the elements as embedded.
    #[must_use]
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    /// Mark the elements as serialized.
    #[must_use]
    pub fn serialized(mut self) -> Self {
        self.serialized = true;
        self
    }
}

/// Relation shape of a field, with the traits of whatever it contains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    #[default]
    None,
    /// Single reference to a persistable object.
    Reference,
    /// Collection field. `list` marks a list-like declared type; `ordered`
    /// marks an explicit index or ordering column.
    Collection {
        list: bool,
        ordered: bool,
        element: ElementTraits,
    },
    Map {
        key: ElementTraits,
        value: ElementTraits,
    },
    Array {
        element: ElementTraits,
    },
}

/// Fieldless projection of [`Relation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    None,
    Reference,
    Collection,
    Map,
    Array,
}

impl Relation {
    /// List of persistable elements.
    pub fn list_of(element: ElementTraits, ordered: bool) -> Self {
        Self::Collection {
            list: true,
            ordered,
            element,
        }
    }

    /// Set-like collection of elements.
    pub fn set_of(element: ElementTraits) -> Self {
        Self::Collection {
            list: false,
            ordered: false,
            element,
        }
    }

    /// Kind of relation.
    pub fn kind(&self) -> RelationKind {
        match self {
            Self::None => RelationKind::None,
            Self::Reference => RelationKind::Reference,
            Self::Collection { .. } => RelationKind::Collection,
            Self::Map { .. } => RelationKind::Map,
            Self::Array { .. } => RelationKind::Array,
        }
    }

    /// Returns `true` if the field's contents include persistable objects.
    pub fn stores_persistable(&self) -> bool {
        match self {
            Self::None => false,
            Self::Reference => true,
            Self::Collection { element, .. } | Self::Array { element } => element.persistent,
            Self::Map { key, value } => key.persistent || value.persistent,
        }
    }
}

/// Persistence metadata of one managed field.
///
/// Built with the `with_*` methods and then frozen by
/// [`ClassDescriptorBuilder`](crate::ClassDescriptorBuilder), which assigns the
/// declared position, the absolute index, and the write-barrier strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    name: String,
    declaring_class: String,
    field_type: FieldType,
    modifier: PersistenceModifier,
    cacheable: bool,
    mediated: bool,
    relation: Relation,
    embedded: bool,
    serialized: bool,
    declared_position: usize,
    absolute_index: usize,
    barrier: WriteBarrier,
}

impl FieldDescriptor {
    /// A cacheable persistent field with no relation.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            declaring_class: String::new(),
            field_type,
            modifier: PersistenceModifier::Persistent,
            cacheable: true,
            mediated: false,
            relation: Relation::None,
            embedded: false,
            serialized: false,
            declared_position: 0,
            absolute_index: 0,
            barrier: WriteBarrier::CheckWrite,
        }
    }

    /// Set the persistence modifier.
    #[must_use]
    pub fn with_modifier(mut self, modifier: PersistenceModifier) -> Self {
        self.modifier = modifier;
        self
    }

    /// Set whether the field may be cached.
    #[must_use]
    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    /// Route writes through the state authority even without dirty checks.
    #[must_use]
    pub fn with_mediated(mut self, mediated: bool) -> Self {
        self.mediated = mediated;
        self
    }

    /// Set the relation the field takes part in.
    #[must_use]
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = relation;
        self
    }

    /// Set whether a referenced object is embedded.
    #[must_use]
    pub fn with_embedded(mut self, embedded: bool) -> Self {
        self.embedded = embedded;
        self
    }

    /// Set whether a referenced object is serialized.
    #[must_use]
    pub fn with_serialized(mut self, serialized: bool) -> Self {
        self.serialized = serialized;
        self
    }

    pub(crate) fn freeze(
        mut self,
        declaring_class: &str,
        declared_position: usize,
        inherited: usize,
    ) -> Self {
        self.declaring_class = declaring_class.to_owned();
        self.declared_position = declared_position;
        self.absolute_index = declared_position + inherited;
        self.barrier = WriteBarrier::select(&self);
        self
    }

    /// Simple field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified name of the class that declares the field.
    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    /// Declared type of the field.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Persistence modifier of the field.
    pub fn modifier(&self) -> PersistenceModifier {
        self.modifier
    }

    /// Returns `true` for a transactional, non-persistent field.
    pub fn is_transactional(&self) -> bool {
        self.modifier == PersistenceModifier::Transactional
    }

    /// Returns `true` if the field may be cached.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Returns `true` if access is mediated by the authority.
    pub fn is_mediated(&self) -> bool {
        self.mediated
    }

    /// Relation the field takes part in.
    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Returns `true` if a referenced object is embedded.
    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// Returns `true` if a referenced object is serialized.
    pub fn is_serialized(&self) -> bool {
        self.serialized
    }

    /// Position among the fields declared by the declaring class.
    pub fn declared_position(&self) -> usize {
        self.declared_position
    }

    /// Declared position plus the number of fields inherited by the class.
    pub fn absolute_index(&self) -> usize {
        self.absolute_index
    }

    /// Write strategy selected when the class was built.
    pub fn barrier(&self) -> WriteBarrier {
        self.barrier
    }
}
