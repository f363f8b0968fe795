use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use keepsake_types::{ClassDescriptor, FieldBitSet, FieldType, Identity, Version, WriteBarrier};
use tracing::debug;

use crate::authority::StateAuthority;
use crate::barrier;
use crate::detached::DetachedState;
use crate::error::{StateError, StateResult};
use crate::exchange;
use crate::flags::InstanceFlags;
use crate::value::FieldValue;

/// An object whose managed fields are intercepted.
///
/// Holds one slot per absolute field of its class. While an authority is
/// attached, the flags and the authority's loaded bits decide whether a slot
/// or the authority holds the current value. Without an authority the slot is
/// always authoritative.
pub struct ManagedInstance {
    class: Arc<ClassDescriptor>,
    fields: Vec<FieldValue>,
    flags: InstanceFlags,
    authority: Option<Arc<dyn StateAuthority>>,
    detached: Option<DetachedState>,
}

impl ManagedInstance {
    /// A transient instance with every slot at its type's default.
    pub fn new(class: Arc<ClassDescriptor>) -> Self {
        let fields = class
            .fields()
            .iter()
            .map(|f| FieldValue::default_for(f.field_type()))
            .collect();
        Self {
            class,
            fields,
            flags: InstanceFlags::READ_WRITE_OK,
            authority: None,
            detached: None,
        }
    }

    /// Mark the instance as detached with `state`, sized to the class.
    #[must_use]
    pub fn with_detached_state(mut self, mut state: DetachedState) -> Self {
        state.fit(self.class.field_count());
        self.detached = Some(state);
        self
    }

    /// Class descriptor of the instance.
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Current flags byte.
    pub fn flags(&self) -> InstanceFlags {
        self.flags
    }

    /// The attached authority, if any.
    pub fn authority(&self) -> Option<&Arc<dyn StateAuthority>> {
        self.authority.as_ref()
    }

    /// Detached state, present once the instance has been detached.
    pub fn detached_state(&self) -> Option<&DetachedState> {
        self.detached.as_ref()
    }

    /// Number of slots, one per absolute field.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Raw slot contents, bypassing every barrier.
    pub fn field(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }

    /// Absolute index of a field by simple or `Class.field` qualified name.
    pub fn index_of(&self, name: &str) -> StateResult<usize> {
        let found = match name.rsplit_once('.') {
            Some((class, simple)) => self
                .class
                .fields()
                .iter()
                .rposition(|f| f.name() == simple && f.declaring_class() == class),
            None => self.class.field_index(name),
        };
        found.ok_or_else(|| StateError::UnknownFieldName {
            class: self.class.name().to_owned(),
            name: name.to_owned(),
        })
    }

    // -- barrier entry points ------------------------------------------------

    /// Write through the field's write barrier.
    pub fn write_field(&mut self, index: usize, value: impl Into<FieldValue>) -> StateResult<()> {
        barrier::write(self, index, value.into())
    }

    /// Read through the field's read barrier.
    pub fn read_field(&mut self, index: usize) -> StateResult<FieldValue> {
        barrier::read(self, index)
    }

    /// Write through the barrier of the field called `name`.
    pub fn write_named(&mut self, name: &str, value: impl Into<FieldValue>) -> StateResult<()> {
        let index = self.index_of(name)?;
        self.write_field(index, value)
    }

    /// Read through the barrier of the field called `name`.
    pub fn read_named(&mut self, name: &str) -> StateResult<FieldValue> {
        let index = self.index_of(name)?;
        self.read_field(index)
    }

    /// Install `value` directly in a slot after checking its type.
    ///
    /// This is the path an authority uses to apply a delegated write; it
    /// performs no delegation or detached bookkeeping.
    pub fn store_field(&mut self, index: usize, value: FieldValue) -> StateResult<()> {
        let (field_type, _) = self.field_info(index)?;
        self.check_type(index, field_type, &value)?;
        self.fields[index] = value;
        Ok(())
    }

    // -- authority exchange --------------------------------------------------

    /// Transfer ownership of the instance to `proposed`.
    ///
    /// An attached authority alone decides what gets installed. Without one
    /// the proposal is installed and the flags become
    /// [`LOAD_REQUIRED`](InstanceFlags::LOAD_REQUIRED).
    pub fn replace_state_authority(&mut self, proposed: Option<Arc<dyn StateAuthority>>) {
        match self.authority.clone() {
            Some(current) => {
                self.authority = current.replacing_state_authority(self, proposed);
            }
            None => {
                self.authority = proposed;
                self.flags = InstanceFlags::LOAD_REQUIRED;
            }
        }
    }

    /// Ask the authority for a new flags byte.
    pub fn replace_flags(&mut self) {
        if let Some(authority) = self.authority.clone() {
            self.flags = authority.replacing_flags(self);
        }
    }

    /// Ask the authority for a new detached state, sized to the class.
    pub fn replace_detached_state(&mut self) {
        if let Some(authority) = self.authority.clone() {
            let current = self.detached.clone();
            let field_count = self.class.field_count();
            self.detached = authority
                .replacing_detached_state(self, current)
                .map(|mut state| {
                    state.fit(field_count);
                    state
                });
        }
    }

    /// Install the authority's value for one field.
    pub fn replace_field(&mut self, index: usize) -> StateResult<()> {
        let (field_type, _) = self.field_info(index)?;
        if let Some(authority) = self.authority.clone() {
            let value = exchange::replacing(authority.as_ref(), self, index, field_type);
            self.fields[index] = value;
        }
        Ok(())
    }

    /// Install the authority's values for `indices`.
    pub fn replace_fields(&mut self, indices: &[usize]) -> StateResult<()> {
        indices.iter().try_for_each(|&index| self.replace_field(index))
    }

    /// Hand the current slot value of one field to the authority.
    pub fn provide_field(&self, index: usize) -> StateResult<()> {
        let (field_type, _) = self.field_info(index)?;
        if let Some(authority) = &self.authority {
            let current = self.fields[index].clone();
            exchange::provide(authority.as_ref(), self, index, field_type, current);
        }
        Ok(())
    }

    /// Hand the current slot values of `indices` to the authority.
    pub fn provide_fields(&self, indices: &[usize]) -> StateResult<()> {
        indices.iter().try_for_each(|&index| self.provide_field(index))
    }

    /// Let the authority load every serializable field.
    pub fn pre_serialize(&mut self) {
        if let Some(authority) = self.authority.clone() {
            authority.pre_serialize(self);
        }
    }

    /// Record that a field changed outside the barriers.
    ///
    /// Forwarded to the authority, and recorded in the detached tracker while
    /// detached. Unknown names are ignored.
    pub fn mark_dirty(&mut self, field_name: &str) {
        if let Some(authority) = self.authority.clone() {
            authority.mark_dirty(self, field_name);
        }
        if self.is_detached() {
            if let Ok(index) = self.index_of(field_name) {
                self.record_detached_write(index);
            }
        }
    }

    // -- queries -------------------------------------------------------------

    /// No authority attached, but detached state present.
    pub fn is_detached(&self) -> bool {
        self.authority.is_none() && self.detached.is_some()
    }

    /// Returns `true` if the instance has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        match (&self.authority, &self.detached) {
            (Some(authority), _) => authority.is_dirty(self),
            (None, Some(state)) => self.class.is_detachable() && state.modified().any(),
            (None, None) => false,
        }
    }

    /// Returns `true` if the authority reports the instance transactional.
    pub fn is_transactional(&self) -> bool {
        self.authority
            .as_ref()
            .is_some_and(|a| a.is_transactional(self))
    }

    /// Returns `true` if the authority reports the instance persistent.
    pub fn is_persistent(&self) -> bool {
        self.authority.as_ref().is_some_and(|a| a.is_persistent(self))
    }

    /// Returns `true` if the instance was made persistent in this transaction.
    pub fn is_new(&self) -> bool {
        self.authority.as_ref().is_some_and(|a| a.is_new(self))
    }

    /// Returns `true` if the instance was deleted in this transaction.
    pub fn is_deleted(&self) -> bool {
        self.authority.as_ref().is_some_and(|a| a.is_deleted(self))
    }

    /// Identity from the authority, or from the detached state.
    pub fn identity(&self) -> Option<Identity> {
        match &self.authority {
            Some(authority) => authority.get_identity(self),
            None => self.detached.as_ref().and_then(|d| d.identity().cloned()),
        }
    }

    /// Identity within the current transaction.
    pub fn transactional_identity(&self) -> Option<Identity> {
        match &self.authority {
            Some(authority) => authority.get_transactional_identity(self),
            None => self.identity(),
        }
    }

    /// Version from the authority, or from the detached state.
    pub fn version(&self) -> Option<Version> {
        match &self.authority {
            Some(authority) => authority.get_version(self),
            None => self.detached.as_ref().and_then(DetachedState::version),
        }
    }

    /// Returns `true` if the slot of `index` holds the field's current value.
    pub fn is_loaded(&self, index: usize) -> bool {
        if index >= self.fields.len() {
            return false;
        }
        match (&self.authority, &self.detached) {
            (Some(authority), _) => authority.is_loaded(self, index),
            (None, Some(state)) => state.loaded().contains(index),
            (None, None) => true,
        }
    }

    /// Loaded bits of every field.
    ///
    /// Taken from the authority when attached, from the detached state when
    /// detached, and all set for a transient instance.
    pub fn loaded_fields(&self) -> FieldBitSet {
        match (&self.authority, &self.detached) {
            (Some(authority), _) => {
                let mut bits = FieldBitSet::new(self.fields.len());
                for index in 0..self.fields.len() {
                    if authority.is_loaded(self, index) {
                        bits.insert(index);
                    }
                }
                bits
            }
            (None, Some(state)) => state.loaded().clone(),
            (None, None) => FieldBitSet::full(self.fields.len()),
        }
    }

    // -- crate internals -----------------------------------------------------

    pub(crate) fn field_info(&self, index: usize) -> StateResult<(FieldType, WriteBarrier)> {
        self.class
            .field(index)
            .filter(|_| index < self.fields.len())
            .map(|f| (f.field_type(), f.barrier()))
            .ok_or_else(|| StateError::UnknownField {
                class: self.class.name().to_owned(),
                index,
            })
    }

    pub(crate) fn check_type(
        &self,
        index: usize,
        field_type: FieldType,
        value: &FieldValue,
    ) -> StateResult<()> {
        if value.fits(field_type) {
            return Ok(());
        }
        let field = self
            .class
            .field(index)
            .map_or_else(String::new, |f| f.name().to_owned());
        Err(StateError::TypeMismatch {
            field,
            expected: field_type,
            found: value.kind_name(),
        })
    }

    /// Slot access for indices already validated by [`field_info`](Self::field_info).
    pub(crate) fn slot(&self, index: usize) -> &FieldValue {
        &self.fields[index]
    }

    pub(crate) fn set_slot(&mut self, index: usize, value: FieldValue) {
        self.fields[index] = value;
    }

    /// Set the detached tracker bit if the class is detachable and the
    /// instance currently reports itself detached.
    pub(crate) fn record_detached_write(&mut self, index: usize) {
        if !self.class.is_detachable() || !self.is_detached() {
            return;
        }
        if let Some(state) = self.detached.as_mut() {
            if state.modified_mut().set(index) {
                debug!(
                    class = self.class.name(),
                    field = index,
                    "field modified while detached"
                );
            }
        }
    }
}

impl fmt::Debug for ManagedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedInstance")
            .field("class", &self.class.name())
            .field("flags", &self.flags)
            .field("attached", &self.authority.is_some())
            .field("detached", &self.detached.is_some())
            .field("fields", &self.fields)
            .finish()
    }
}

/// Shared handle to a managed instance, used for references between
/// instances.
///
/// Equality is identity: two handles are equal only if they point at the same
/// instance.
#[derive(Clone)]
pub struct InstanceRef {
    class: Arc<ClassDescriptor>,
    cell: Arc<RwLock<ManagedInstance>>,
}

impl InstanceRef {
    /// Wrap `instance` in a new shared handle.
    pub fn new(instance: ManagedInstance) -> Self {
        Self {
            class: Arc::clone(instance.class()),
            cell: Arc::new(RwLock::new(instance)),
        }
    }

    /// Class of the referenced instance, readable without locking.
    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    /// Lock the instance for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, ManagedInstance> {
        self.cell.read().expect("lock poisoned")
    }

    /// Lock the instance for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, ManagedInstance> {
        self.cell.write().expect("lock poisoned")
    }

    /// Read without blocking. Returns `None` while a writer holds the instance.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, ManagedInstance>> {
        self.cell.try_read().ok()
    }

    /// Returns `true` if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Address of the referenced instance, stable for its lifetime.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.cell) as usize
    }
}

impl PartialEq for InstanceRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceRef({}@{:#x})", self.class.name(), self.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{person_class, RecordingAuthority};
    use keepsake_types::FieldDescriptor;

    #[test]
    fn new_instance_uses_type_defaults() {
        let instance = ManagedInstance::new(person_class(true));
        assert_eq!(instance.field_count(), 6);
        assert_eq!(instance.field(0), Some(&FieldValue::Long(0)));
        assert_eq!(instance.field(5), Some(&FieldValue::Null));
        assert!(!instance.is_detached());
        assert!(!instance.is_dirty());
        assert_eq!(instance.loaded_fields().count_ones(), 6);
    }

    #[test]
    fn attaching_installs_proposal_and_requires_load() {
        let mut instance = ManagedInstance::new(person_class(false));
        let authority = Arc::new(RecordingAuthority::default());
        instance.replace_state_authority(Some(authority));
        assert!(instance.authority().is_some());
        assert_eq!(instance.flags(), InstanceFlags::LOAD_REQUIRED);
    }

    #[test]
    fn attached_authority_that_refuses_stays_installed() {
        let mut instance = ManagedInstance::new(person_class(false));
        let owner: Arc<dyn StateAuthority> = Arc::new(RecordingAuthority {
            refuse_replacement: true,
            ..Default::default()
        });
        instance.replace_state_authority(Some(Arc::clone(&owner)));

        let intruder: Arc<dyn StateAuthority> = Arc::new(RecordingAuthority::default());
        instance.replace_state_authority(Some(intruder));
        assert!(Arc::ptr_eq(instance.authority().unwrap(), &owner));

        instance.replace_state_authority(None);
        assert!(Arc::ptr_eq(instance.authority().unwrap(), &owner));
    }

    #[test]
    fn attached_authority_may_release() {
        let mut instance = ManagedInstance::new(person_class(false));
        instance.replace_state_authority(Some(Arc::new(RecordingAuthority::default())));
        instance.replace_state_authority(None);
        assert!(instance.authority().is_none());
    }

    #[test]
    fn replace_flags_asks_authority() {
        let mut instance = ManagedInstance::new(person_class(false));
        instance.replace_state_authority(Some(Arc::new(RecordingAuthority {
            flags: InstanceFlags::READ_OK,
            ..Default::default()
        })));
        instance.replace_flags();
        assert_eq!(instance.flags(), InstanceFlags::READ_OK);
    }

    #[test]
    fn replace_and_provide_use_typed_exchange() {
        let mut instance = ManagedInstance::new(person_class(false));
        let authority = Arc::new(RecordingAuthority {
            replacement: FieldValue::from("loaded"),
            ..Default::default()
        });
        instance.replace_state_authority(Some(authority.clone()));
        instance.replace_fields(&[5]).unwrap();
        assert_eq!(instance.field(5), Some(&FieldValue::from("loaded")));

        instance.provide_fields(&[5]).unwrap();
        assert_eq!(
            authority.provided.lock().unwrap().as_slice(),
            &[(5, FieldValue::from("loaded"))]
        );
        assert!(matches!(
            instance.replace_field(6),
            Err(StateError::UnknownField { index: 6, .. })
        ));
    }

    #[test]
    fn mistyped_replacement_falls_back_to_default() {
        let mut instance = ManagedInstance::new(person_class(false));
        instance.replace_state_authority(Some(Arc::new(RecordingAuthority {
            replacement: FieldValue::from("not an int"),
            ..Default::default()
        })));
        instance.store_field(4, FieldValue::Int(9)).unwrap();
        instance.replace_field(4).unwrap();
        assert_eq!(instance.field(4), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn mark_dirty_while_detached_sets_tracker_bit() {
        let class = person_class(true);
        let mut instance = ManagedInstance::new(Arc::clone(&class))
            .with_detached_state(DetachedState::new(FieldBitSet::full(6)));
        instance.mark_dirty("age");
        instance.mark_dirty("com.acme.Base.owner");
        instance.mark_dirty("missing");
        let modified: Vec<_> = instance.detached_state().unwrap().modified().iter().collect();
        assert_eq!(modified, vec![2, 4]);
        assert!(instance.is_dirty());
    }

    #[test]
    fn mark_dirty_forwards_to_authority() {
        let mut instance = ManagedInstance::new(person_class(false));
        let authority = Arc::new(RecordingAuthority::default());
        instance.replace_state_authority(Some(authority.clone()));
        instance.mark_dirty("first");
        assert_eq!(authority.dirty.lock().unwrap().as_slice(), &["first".to_owned()]);
    }

    #[test]
    fn identity_and_version_come_from_detached_state() {
        let instance = ManagedInstance::new(person_class(true)).with_detached_state(
            DetachedState::new(FieldBitSet::from_iter([0, 3]))
                .with_identity(Identity::datastore("com.acme.Person", 7))
                .with_version(Version::Counter(4)),
        );
        assert!(instance.is_detached());
        assert_eq!(instance.identity(), Some(Identity::datastore("com.acme.Person", 7)));
        assert_eq!(instance.transactional_identity(), instance.identity());
        assert_eq!(instance.version(), Some(Version::Counter(4)));
        assert!(instance.is_loaded(3));
        assert!(!instance.is_loaded(1));
    }

    #[test]
    fn sparse_loaded_bits_still_track_every_field() {
        let mut instance = ManagedInstance::new(person_class(true))
            .with_detached_state(DetachedState::new([0, 1, 2].into_iter().collect()));
        let state = instance.detached_state().unwrap();
        assert_eq!(state.modified().len(), 6);
        assert_eq!(state.loaded().len(), 6);

        instance.write_field(5, "b").unwrap();
        let modified: Vec<_> = instance.detached_state().unwrap().modified().iter().collect();
        assert_eq!(modified, vec![5]);
        assert!(instance.is_dirty());
        assert!(!instance.is_loaded(5));
    }

    #[test]
    fn replaced_detached_state_is_sized_to_class() {
        let mut instance = ManagedInstance::new(person_class(true));
        instance.replace_state_authority(Some(Arc::new(RecordingAuthority {
            detached_replacement: Some(DetachedState::new(FieldBitSet::full(2))),
            ..Default::default()
        })));
        instance.replace_detached_state();
        instance.replace_state_authority(None);
        assert!(instance.is_detached());
        assert_eq!(instance.detached_state().unwrap().modified().len(), 6);

        instance.write_field(4, 41).unwrap();
        let modified: Vec<_> = instance.detached_state().unwrap().modified().iter().collect();
        assert_eq!(modified, vec![4]);
        assert!(instance.is_dirty());
    }

    #[test]
    fn store_field_checks_type() {
        let mut instance = ManagedInstance::new(person_class(false));
        let err = instance.store_field(4, FieldValue::from("x")).unwrap_err();
        assert_eq!(
            err,
            StateError::TypeMismatch {
                field: "age".into(),
                expected: FieldType::Int,
                found: "string"
            }
        );
    }

    #[test]
    fn instance_refs_compare_by_identity() {
        let class = ClassDescriptor::builder("a.B")
            .field(FieldDescriptor::new("x", FieldType::Int))
            .build()
            .unwrap();
        let a = InstanceRef::new(ManagedInstance::new(Arc::clone(&class)));
        let b = InstanceRef::new(ManagedInstance::new(class));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.class().name(), "a.B");
        let guard = a.write();
        assert!(a.try_read().is_none());
        drop(guard);
        assert!(a.try_read().is_some());
    }
}
