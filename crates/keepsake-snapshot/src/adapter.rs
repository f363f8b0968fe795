//! Seams between the snapshot builder and the persistence runtime.

use keepsake_state::{FieldValue, ManagedInstance};
use keepsake_types::{Identity, IdentityKind, IdentityPlaceholder};

/// Answers identity questions about persistable values.
pub trait IdentityAdapter: Send + Sync {
    /// Returns `true` if `value` is a reference to a persistable object.
    fn is_persistable(&self, value: &FieldValue) -> bool;

    /// Identity of a persistable instance, if it has one yet.
    fn get_identity(&self, instance: &ManagedInstance) -> Option<Identity>;

    /// Returns `true` if `identity` is a datastore-assigned native identity.
    fn is_native_identity_kind(&self, identity: &Identity) -> bool;

    /// Returns `true` if `identity` wraps a single typed key field.
    fn is_single_field_identity_kind(&self, identity: &Identity) -> bool;

    /// Cache-safe stand-in for a reference to an instance of `class_name`.
    ///
    /// Native and single-field identities are kept verbatim; any other kind is
    /// paired with the class name.
    fn placeholder(&self, class_name: &str, identity: Identity) -> IdentityPlaceholder {
        if self.is_native_identity_kind(&identity) || self.is_single_field_identity_kind(&identity)
        {
            IdentityPlaceholder::verbatim(identity)
        } else {
            IdentityPlaceholder::typed(class_name, identity)
        }
    }
}

/// Recognizes and unwraps lazy-loading wrappers.
pub trait LazyWrapperAdapter: Send + Sync {
    /// Returns `true` if `value` is a lazy-loading wrapper.
    fn is_wrapper(&self, value: &FieldValue) -> bool;

    /// Returns `true` unless `value` is a wrapper whose contents are not
    /// loaded.
    fn is_loaded(&self, value: &FieldValue) -> bool;

    /// The wrapped value, or `value` itself if it is not a wrapper.
    fn unwrap<'a>(&self, value: &'a FieldValue) -> &'a FieldValue;
}

/// Adapter for the runtime's own value model.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardAdapter;

impl IdentityAdapter for StandardAdapter {
    fn is_persistable(&self, value: &FieldValue) -> bool {
        matches!(value, FieldValue::Ref(_))
    }

    fn get_identity(&self, instance: &ManagedInstance) -> Option<Identity> {
        instance.identity()
    }

    fn is_native_identity_kind(&self, identity: &Identity) -> bool {
        identity.kind() == IdentityKind::Native
    }

    fn is_single_field_identity_kind(&self, identity: &Identity) -> bool {
        identity.kind() == IdentityKind::SingleField
    }
}

impl LazyWrapperAdapter for StandardAdapter {
    fn is_wrapper(&self, value: &FieldValue) -> bool {
        matches!(value, FieldValue::Tracked(_))
    }

    fn is_loaded(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Tracked(tracked) => tracked.is_loaded(),
            _ => true,
        }
    }

    fn unwrap<'a>(&self, value: &'a FieldValue) -> &'a FieldValue {
        match value {
            FieldValue::Tracked(tracked) => tracked.backing(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_state::Tracked;
    use keepsake_types::IdKey;

    #[test]
    fn placeholder_kinds() {
        let adapter = StandardAdapter;
        let native = Identity::datastore("a.B", 1);
        assert_eq!(
            adapter.placeholder("a.B", native.clone()),
            IdentityPlaceholder::Verbatim(native)
        );
        let app = Identity::application([IdKey::Long(1), IdKey::Long(2)]);
        assert_eq!(
            adapter.placeholder("a.B", app.clone()),
            IdentityPlaceholder::typed("a.B", app)
        );
    }

    #[test]
    fn unwraps_tracked_values() {
        let adapter = StandardAdapter;
        let inner = FieldValue::text_buffer("x");
        let tracked = FieldValue::Tracked(Tracked::unloaded(inner.clone()));
        assert!(adapter.is_wrapper(&tracked));
        assert!(!adapter.is_loaded(&tracked));
        assert_eq!(adapter.unwrap(&tracked), &inner);
        assert!(adapter.is_loaded(&inner));
        assert_eq!(adapter.unwrap(&inner), &inner);
    }
}
