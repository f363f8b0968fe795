//! Fixtures shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};

use keepsake_types::{ClassDescriptor, FieldDescriptor, FieldType, Identity, Version};

use crate::authority::StateAuthority;
use crate::detached::DetachedState;
use crate::flags::InstanceFlags;
use crate::instance::ManagedInstance;
use crate::value::FieldValue;

/// `com.acme.Person` extending `com.acme.Base`: three inherited fields
/// (`id`, `created`, `owner`) then `first`, `age`, `last`.
pub(crate) fn person_class(detachable: bool) -> Arc<ClassDescriptor> {
    person_class_with(detachable, FieldDescriptor::new("last", FieldType::String))
}

pub(crate) fn person_class_with(detachable: bool, last: FieldDescriptor) -> Arc<ClassDescriptor> {
    let base = ClassDescriptor::builder("com.acme.Base")
        .field(FieldDescriptor::new("id", FieldType::Long))
        .field(FieldDescriptor::new("created", FieldType::Object))
        .field(FieldDescriptor::new("owner", FieldType::String))
        .detachable(detachable)
        .build()
        .unwrap();
    ClassDescriptor::builder("com.acme.Person")
        .extends(&base)
        .field(FieldDescriptor::new("first", FieldType::String))
        .field(FieldDescriptor::new("age", FieldType::Int))
        .field(last)
        .build()
        .unwrap()
}

/// Authority that records every exchange and applies delegated writes.
#[derive(Default)]
pub(crate) struct RecordingAuthority {
    pub sets: Mutex<Vec<(usize, FieldValue, FieldValue)>>,
    pub provided: Mutex<Vec<(usize, FieldValue)>>,
    pub dirty: Mutex<Vec<String>>,
    pub replacement: FieldValue,
    pub flags: InstanceFlags,
    /// Fields reported loaded; everything else is unloaded.
    pub loaded: Vec<usize>,
    pub refuse_replacement: bool,
    /// Release the instance from inside a delegated write.
    pub detach_on_set: bool,
    /// Returned from `replacing_detached_state` instead of the current state.
    pub detached_replacement: Option<DetachedState>,
}

impl StateAuthority for RecordingAuthority {
    fn replacing_state_authority(
        &self,
        instance: &ManagedInstance,
        proposed: Option<Arc<dyn StateAuthority>>,
    ) -> Option<Arc<dyn StateAuthority>> {
        if self.refuse_replacement {
            instance.authority().cloned()
        } else {
            proposed
        }
    }

    fn replacing_flags(&self, _instance: &ManagedInstance) -> InstanceFlags {
        self.flags
    }

    fn replacing_detached_state(
        &self,
        _instance: &ManagedInstance,
        current: Option<DetachedState>,
    ) -> Option<DetachedState> {
        self.detached_replacement.clone().or(current)
    }

    fn is_dirty(&self, _instance: &ManagedInstance) -> bool {
        !self.sets.lock().unwrap().is_empty()
    }

    fn is_transactional(&self, _instance: &ManagedInstance) -> bool {
        true
    }

    fn is_persistent(&self, _instance: &ManagedInstance) -> bool {
        true
    }

    fn is_new(&self, _instance: &ManagedInstance) -> bool {
        false
    }

    fn is_deleted(&self, _instance: &ManagedInstance) -> bool {
        false
    }

    fn is_loaded(&self, _instance: &ManagedInstance, field: usize) -> bool {
        self.loaded.contains(&field)
    }

    fn get_identity(&self, instance: &ManagedInstance) -> Option<Identity> {
        Some(Identity::datastore(instance.class().name(), 1))
    }

    fn get_version(&self, _instance: &ManagedInstance) -> Option<Version> {
        Some(Version::Counter(1))
    }

    fn mark_dirty(&self, _instance: &ManagedInstance, field_name: &str) {
        self.dirty.lock().unwrap().push(field_name.to_owned());
    }

    fn set_object_field(
        &self,
        instance: &mut ManagedInstance,
        field: usize,
        current: FieldValue,
        new: FieldValue,
    ) {
        self.sets
            .lock()
            .unwrap()
            .push((field, current, new.clone()));
        instance.store_field(field, new).unwrap();
        if self.detach_on_set {
            instance.replace_state_authority(None);
        }
    }

    fn replacing_object_field(&self, _instance: &ManagedInstance, _field: usize) -> FieldValue {
        self.replacement.clone()
    }

    fn provided_object_field(&self, _instance: &ManagedInstance, field: usize, current: FieldValue) {
        self.provided.lock().unwrap().push((field, current));
    }
}
