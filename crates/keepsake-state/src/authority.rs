use std::sync::Arc;

use keepsake_types::{Identity, Version};
use tracing::warn;

use crate::detached::DetachedState;
use crate::flags::InstanceFlags;
use crate::instance::ManagedInstance;
use crate::value::FieldValue;

/// Generates the boxed typed exchange triplet for one scalar kind.
macro_rules! typed_exchange {
    ($($ty:ty, $variant:ident, $kind:literal => $set:ident, $replacing:ident, $provided:ident;)+) => {
        $(
            #[doc = concat!("Delegated write of a ", $kind, " field.")]
            fn $set(&self, instance: &mut ManagedInstance, field: usize, current: $ty, new: $ty) {
                self.set_object_field(
                    instance,
                    field,
                    FieldValue::$variant(current),
                    FieldValue::$variant(new),
                );
            }

            #[doc = concat!("Value to install in a ", $kind, " field.")]
            fn $replacing(&self, instance: &ManagedInstance, field: usize) -> $ty {
                match self.replacing_object_field(instance, field) {
                    FieldValue::$variant(value) => value,
                    other => {
                        warn!(
                            class = instance.class().name(),
                            field,
                            expected = $kind,
                            found = other.kind_name(),
                            "replacement value does not match field type"
                        );
                        <$ty>::default()
                    }
                }
            }

            fn $provided(&self, instance: &ManagedInstance, field: usize, current: $ty) {
                self.provided_object_field(instance, field, FieldValue::$variant(current));
            }
        )+
    };
}

/// Capability contract between a managed instance and the runtime tracking
/// it.
///
/// An authority records dirtiness, owns identity and version, and mediates
/// field exchange for every instance attached to it. Field indices are always
/// absolute.
///
/// Only the object exchange triplet is required. The typed triplets box their
/// values into it and can be overridden where an authority keeps unboxed
/// storage.
pub trait StateAuthority: Send + Sync {
    // -- lifecycle -----------------------------------------------------------

    /// Decide what replaces this authority on `instance`.
    ///
    /// Called only while this authority is attached. Returning `Some(self)`
    /// refuses the change; returning `proposed` accepts it.
    fn replacing_state_authority(
        &self,
        instance: &ManagedInstance,
        proposed: Option<Arc<dyn StateAuthority>>,
    ) -> Option<Arc<dyn StateAuthority>>;

    /// Flags to install on `instance`.
    fn replacing_flags(&self, instance: &ManagedInstance) -> InstanceFlags;

    /// Detached state to install on `instance`, given its current one.
    fn replacing_detached_state(
        &self,
        _instance: &ManagedInstance,
        current: Option<DetachedState>,
    ) -> Option<DetachedState> {
        current
    }

    /// Make sure every field needed for serialization is loaded.
    fn pre_serialize(&self, _instance: &mut ManagedInstance) {}

    // -- queries -------------------------------------------------------------

    fn is_dirty(&self, instance: &ManagedInstance) -> bool;
    fn is_transactional(&self, instance: &ManagedInstance) -> bool;
    fn is_persistent(&self, instance: &ManagedInstance) -> bool;
    fn is_new(&self, instance: &ManagedInstance) -> bool;
    fn is_deleted(&self, instance: &ManagedInstance) -> bool;

    /// Returns `true` if the slot of `field` holds its current value.
    fn is_loaded(&self, instance: &ManagedInstance, field: usize) -> bool;

    fn get_identity(&self, instance: &ManagedInstance) -> Option<Identity>;

    /// Identity as seen inside the current transaction.
    fn get_transactional_identity(&self, instance: &ManagedInstance) -> Option<Identity> {
        self.get_identity(instance)
    }

    fn get_version(&self, instance: &ManagedInstance) -> Option<Version>;

    // -- mutation ------------------------------------------------------------

    /// Record that the field named `field_name` changed outside a barrier.
    fn mark_dirty(&self, instance: &ManagedInstance, field_name: &str);

    // -- exchange ------------------------------------------------------------

    /// Delegated write. The authority records the change and installs `new`
    /// itself, typically with [`ManagedInstance::store_field`].
    fn set_object_field(
        &self,
        instance: &mut ManagedInstance,
        field: usize,
        current: FieldValue,
        new: FieldValue,
    );

    /// Value the instance should install in `field`.
    fn replacing_object_field(&self, instance: &ManagedInstance, field: usize) -> FieldValue;

    /// Receives the current value of `field` when the instance provides it.
    fn provided_object_field(&self, instance: &ManagedInstance, field: usize, current: FieldValue);

    typed_exchange! {
        bool, Bool, "boolean" => set_boolean_field, replacing_boolean_field, provided_boolean_field;
        char, Char, "char" => set_char_field, replacing_char_field, provided_char_field;
        i8, Byte, "byte" => set_byte_field, replacing_byte_field, provided_byte_field;
        i16, Short, "short" => set_short_field, replacing_short_field, provided_short_field;
        i32, Int, "int" => set_int_field, replacing_int_field, provided_int_field;
        i64, Long, "long" => set_long_field, replacing_long_field, provided_long_field;
        f32, Float, "float" => set_float_field, replacing_float_field, provided_float_field;
        f64, Double, "double" => set_double_field, replacing_double_field, provided_double_field;
    }

    /// Delegated write of a string field; `None` is null.
    fn set_string_field(
        &self,
        instance: &mut ManagedInstance,
        field: usize,
        current: Option<String>,
        new: Option<String>,
    ) {
        self.set_object_field(instance, field, current.into(), new.into());
    }

    fn replacing_string_field(&self, instance: &ManagedInstance, field: usize) -> Option<String> {
        match self.replacing_object_field(instance, field) {
            FieldValue::Str(value) => Some(value),
            FieldValue::Null => None,
            other => {
                warn!(
                    class = instance.class().name(),
                    field,
                    expected = "string",
                    found = other.kind_name(),
                    "replacement value does not match field type"
                );
                None
            }
        }
    }

    fn provided_string_field(&self, instance: &ManagedInstance, field: usize, current: Option<String>) {
        self.provided_object_field(instance, field, current.into());
    }
}
