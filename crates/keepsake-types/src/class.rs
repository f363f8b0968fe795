use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::FieldDescriptor;
use crate::error::{TypeError, TypeResult};
use crate::strategy::WriteBarrier;

/// Managed field layout of a class, including every inherited field.
///
/// Fields are numbered absolutely: the superclass chain's fields come first,
/// so a field declared at position `p` by a class inheriting `n` managed
/// fields has absolute index `n + p`. A `ClassDescriptor` is immutable once
/// built and is shared as `Arc<ClassDescriptor>`.
pub struct ClassDescriptor {
    name: String,
    superclass: Option<Arc<ClassDescriptor>>,
    inherited_field_count: usize,
    fields: Vec<FieldDescriptor>,
    detachable: bool,
}

impl ClassDescriptor {
    /// Start building the descriptor of `name`.
    pub fn builder(name: impl Into<String>) -> ClassDescriptorBuilder {
        ClassDescriptorBuilder {
            name: name.into(),
            superclass: None,
            declared: Vec::new(),
            detachable: false,
        }
    }

    /// Fully-qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct superclass, if any.
    pub fn superclass(&self) -> Option<&Arc<ClassDescriptor>> {
        self.superclass.as_ref()
    }

    /// Number of managed fields declared by superclasses.
    pub fn inherited_field_count(&self) -> usize {
        self.inherited_field_count
    }

    /// Total number of managed fields across the class chain.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Whether instances keep detached state when they leave their authority.
    pub fn is_detachable(&self) -> bool {
        self.detachable
    }

    /// Field at an absolute index.
    pub fn field(&self, absolute_index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(absolute_index)
    }

    /// Every managed field in absolute order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Fields declared by this class itself.
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.fields[self.inherited_field_count..]
    }

    /// Absolute index of the field declared at `declared_position`.
    pub fn absolute_index(&self, declared_position: usize) -> Option<usize> {
        let index = self.inherited_field_count + declared_position;
        (index < self.fields.len()).then_some(index)
    }

    /// Absolute index of the field named `name`.
    ///
    /// A field declared by a subclass hides a superclass field of the same
    /// name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().rposition(|f| f.name() == name)
    }

    /// Write strategy of the field at an absolute index.
    pub fn barrier(&self, absolute_index: usize) -> Option<WriteBarrier> {
        self.field(absolute_index).map(FieldDescriptor::barrier)
    }

    /// Returns `true` if this class is `other` or inherits from it.
    pub fn is_subclass_of(&self, other: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == other {
                return true;
            }
            current = class.superclass.as_deref();
        }
        false
    }
}

impl PartialEq for ClassDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.detachable == other.detachable
            && self.fields == other.fields
    }
}

impl Eq for ClassDescriptor {}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name()))
            .field("inherited_field_count", &self.inherited_field_count)
            .field("field_count", &self.fields.len())
            .field("detachable", &self.detachable)
            .finish()
    }
}

/// Builder for [`ClassDescriptor`].
pub struct ClassDescriptorBuilder {
    name: String,
    superclass: Option<Arc<ClassDescriptor>>,
    declared: Vec<FieldDescriptor>,
    detachable: bool,
}

impl ClassDescriptorBuilder {
    /// Inherit the managed fields of `superclass`.
    #[must_use]
    pub fn extends(mut self, superclass: &Arc<ClassDescriptor>) -> Self {
        self.superclass = Some(Arc::clone(superclass));
        self
    }

    /// Declare the next field. Fields are positioned in declaration order.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.declared.push(field);
        self
    }

    /// Whether instances of the class may be detached.
    #[must_use]
    pub fn detachable(mut self, detachable: bool) -> Self {
        self.detachable = detachable;
        self
    }

    /// Freeze the layout.
    ///
    /// A subclass of a detachable class is detachable as well.
    pub fn build(self) -> TypeResult<Arc<ClassDescriptor>> {
        if self.name.is_empty() {
            return Err(TypeError::EmptyClassName);
        }

        let mut seen = HashSet::new();
        for (position, field) in self.declared.iter().enumerate() {
            if field.name().is_empty() {
                return Err(TypeError::EmptyFieldName {
                    class: self.name.clone(),
                    position,
                });
            }
            if !seen.insert(field.name()) {
                return Err(TypeError::DuplicateField {
                    class: self.name.clone(),
                    field: field.name().to_owned(),
                });
            }
        }

        let inherited: Vec<FieldDescriptor> = self
            .superclass
            .as_ref()
            .map(|s| s.fields.clone())
            .unwrap_or_default();
        let inherited_field_count = inherited.len();
        let detachable = self.detachable
            || self.superclass.as_ref().is_some_and(|s| s.detachable);

        let mut fields = inherited;
        fields.extend(
            self.declared
                .into_iter()
                .enumerate()
                .map(|(position, f)| f.freeze(&self.name, position, inherited_field_count)),
        );

        Ok(Arc::new(ClassDescriptor {
            name: self.name,
            superclass: self.superclass,
            inherited_field_count,
            fields,
            detachable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldType, PersistenceModifier};

    fn base() -> Arc<ClassDescriptor> {
        ClassDescriptor::builder("com.acme.Base")
            .field(FieldDescriptor::new("id", FieldType::Long))
            .field(FieldDescriptor::new("created", FieldType::Object))
            .field(FieldDescriptor::new("owner", FieldType::String))
            .build()
            .unwrap()
    }

    #[test]
    fn inherited_fields_come_first() {
        let base = base();
        let person = ClassDescriptor::builder("com.acme.Person")
            .extends(&base)
            .field(FieldDescriptor::new("first", FieldType::String))
            .field(FieldDescriptor::new("age", FieldType::Int))
            .field(FieldDescriptor::new("last", FieldType::String))
            .build()
            .unwrap();

        assert_eq!(person.inherited_field_count(), 3);
        assert_eq!(person.field_count(), 6);
        assert_eq!(person.absolute_index(2), Some(5));
        assert_eq!(person.absolute_index(3), None);

        let last = person.field(5).unwrap();
        assert_eq!(last.name(), "last");
        assert_eq!(last.declared_position(), 2);
        assert_eq!(last.absolute_index(), 5);
        assert_eq!(last.declaring_class(), "com.acme.Person");
        assert_eq!(person.field(0).unwrap().declaring_class(), "com.acme.Base");
        assert_eq!(person.declared_fields().len(), 3);
    }

    #[test]
    fn barriers_are_selected_at_build() {
        let class = ClassDescriptor::builder("x.Y")
            .field(FieldDescriptor::new("a", FieldType::Int))
            .field(FieldDescriptor::new("b", FieldType::Int).with_mediated(true))
            .field(
                FieldDescriptor::new("c", FieldType::Int).with_modifier(PersistenceModifier::None),
            )
            .build()
            .unwrap();
        assert_eq!(class.barrier(0), Some(WriteBarrier::CheckWrite));
        assert_eq!(class.barrier(1), Some(WriteBarrier::MediateWrite));
        assert_eq!(class.barrier(2), Some(WriteBarrier::NoBarrier));
        assert_eq!(class.barrier(3), None);
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let err = ClassDescriptor::builder("x.Y")
            .field(FieldDescriptor::new("a", FieldType::Int))
            .field(FieldDescriptor::new("a", FieldType::Long))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            TypeError::DuplicateField {
                class: "x.Y".into(),
                field: "a".into()
            }
        );
    }

    #[test]
    fn empty_names_are_rejected() {
        assert_eq!(
            ClassDescriptor::builder("").build().unwrap_err(),
            TypeError::EmptyClassName
        );
        assert!(matches!(
            ClassDescriptor::builder("x.Y")
                .field(FieldDescriptor::new("", FieldType::Int))
                .build(),
            Err(TypeError::EmptyFieldName { position: 0, .. })
        ));
    }

    #[test]
    fn subclass_field_hides_superclass_field() {
        let base = base();
        let sub = ClassDescriptor::builder("com.acme.Sub")
            .extends(&base)
            .field(FieldDescriptor::new("owner", FieldType::Object))
            .build()
            .unwrap();
        assert_eq!(sub.field_index("owner"), Some(3));
        assert_eq!(sub.field_index("id"), Some(0));
        assert!(sub.is_subclass_of("com.acme.Base"));
        assert!(!base.is_subclass_of("com.acme.Sub"));
    }

    #[test]
    fn detachable_is_inherited() {
        let base = ClassDescriptor::builder("a.Base").detachable(true).build().unwrap();
        let sub = ClassDescriptor::builder("a.Sub").extends(&base).build().unwrap();
        assert!(sub.is_detachable());
    }
}
