use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single key component of an identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdKey {
    Long(i64),
    Text(String),
    Uuid(Uuid),
}

impl fmt::Display for IdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Uuid(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for IdKey {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<&str> for IdKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for IdKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for IdKey {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

/// How an identity represents itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityKind {
    /// Datastore-assigned surrogate key. Carries its target class.
    Native,
    /// Application key made of one field. Carries its target class.
    SingleField,
    /// Application key of arbitrary shape. Carries no type information.
    Application,
}

/// Identity of a persistent object.
///
/// The set of representations is closed: every identity either names its
/// target class itself (`Datastore`, `SingleField`) or does not
/// (`Application`), in which case it cannot be resolved back to a class
/// without help. See [`IdentityPlaceholder`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identity {
    /// Surrogate key generated by the datastore.
    Datastore { class_name: String, key: i64 },
    /// Application identity backed by a single primary-key field.
    SingleField { class_name: String, key: IdKey },
    /// Application identity of one or more key fields.
    Application(Vec<IdKey>),
}

impl Identity {
    /// Datastore identity for `class_name` with surrogate `key`.
    pub fn datastore(class_name: impl Into<String>, key: i64) -> Self {
        Self::Datastore {
            class_name: class_name.into(),
            key,
        }
    }

    /// Single-field application identity for `class_name`.
    pub fn single_field(class_name: impl Into<String>, key: impl Into<IdKey>) -> Self {
        Self::SingleField {
            class_name: class_name.into(),
            key: key.into(),
        }
    }

    /// Composite application identity.
    pub fn application(keys: impl IntoIterator<Item = IdKey>) -> Self {
        Self::Application(keys.into_iter().collect())
    }

    /// Kind of identity.
    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::Datastore { .. } => IdentityKind::Native,
            Self::SingleField { .. } => IdentityKind::SingleField,
            Self::Application(_) => IdentityKind::Application,
        }
    }

    /// Returns `true` if the identity names its own target class.
    pub fn is_self_describing(&self) -> bool {
        !matches!(self.kind(), IdentityKind::Application)
    }

    /// Target class named by the identity itself, if any.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Datastore { class_name, .. } | Self::SingleField { class_name, .. } => {
                Some(class_name)
            }
            Self::Application(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Datastore { class_name, key } => write!(f, "{key}[OID]{class_name}"),
            Self::SingleField { class_name, key } => write!(f, "{class_name}:{key}"),
            Self::Application(keys) => {
                f.write_str("(")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Cache-safe stand-in for a reference to a persistable object.
///
/// Self-describing identities are kept verbatim. Any other identity is paired
/// with the fully-qualified name of the referenced object's class so it can be
/// resolved later.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentityPlaceholder {
    Verbatim(Identity),
    Typed { class_name: String, identity: Identity },
}

impl IdentityPlaceholder {
    /// Placeholder storing `identity` as is.
    pub fn verbatim(identity: Identity) -> Self {
        Self::Verbatim(identity)
    }

    /// Placeholder pairing `identity` with the referenced object's class.
    pub fn typed(class_name: impl Into<String>, identity: Identity) -> Self {
        Self::Typed {
            class_name: class_name.into(),
            identity,
        }
    }

    /// Choose the representation from the identity's own kind.
    pub fn wrap(class_name: impl Into<String>, identity: Identity) -> Self {
        if identity.is_self_describing() {
            Self::Verbatim(identity)
        } else {
            Self::typed(class_name, identity)
        }
    }

    /// The wrapped identity.
    pub fn identity(&self) -> &Identity {
        match self {
            Self::Verbatim(identity) | Self::Typed { identity, .. } => identity,
        }
    }

    /// Class of the referenced object, from the wrapper or the identity.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Verbatim(identity) => identity.class_name(),
            Self::Typed { class_name, .. } => Some(class_name),
        }
    }

    /// Split into the wrapped class name (typed form only) and the identity.
    pub fn into_parts(self) -> (Option<String>, Identity) {
        match self {
            Self::Verbatim(identity) => (None, identity),
            Self::Typed {
                class_name,
                identity,
            } => (Some(class_name), identity),
        }
    }
}

impl fmt::Display for IdentityPlaceholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verbatim(identity) => write!(f, "{identity}"),
            Self::Typed {
                class_name,
                identity,
            } => write!(f, "{class_name}#{identity}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_kinds() {
        assert_eq!(Identity::datastore("a.B", 1).kind(), IdentityKind::Native);
        assert_eq!(
            Identity::single_field("a.B", "x").kind(),
            IdentityKind::SingleField
        );
        assert_eq!(
            Identity::application([IdKey::Long(1)]).kind(),
            IdentityKind::Application
        );
    }

    #[test]
    fn wrap_keeps_self_describing_identities_verbatim() {
        let native = Identity::datastore("com.acme.Person", 42);
        let placeholder = IdentityPlaceholder::wrap("com.acme.Person", native.clone());
        assert_eq!(placeholder, IdentityPlaceholder::Verbatim(native.clone()));
        assert_eq!(placeholder.into_parts(), (None, native));

        let single = Identity::single_field("com.acme.Person", Uuid::nil());
        let placeholder = IdentityPlaceholder::wrap("com.acme.Person", single.clone());
        assert_eq!(placeholder.identity(), &single);
    }

    #[test]
    fn wrap_pairs_application_identity_with_class() {
        let id = Identity::application([IdKey::from("EU"), IdKey::Long(7)]);
        let placeholder = IdentityPlaceholder::wrap("com.acme.Region", id.clone());
        assert_eq!(placeholder.class_name(), Some("com.acme.Region"));
        let (class_name, identity) = placeholder.into_parts();
        assert_eq!(class_name.as_deref(), Some("com.acme.Region"));
        assert_eq!(identity, id);
    }

    #[test]
    fn verbatim_class_name_comes_from_identity() {
        let placeholder = IdentityPlaceholder::verbatim(Identity::datastore("x.Y", 3));
        assert_eq!(placeholder.class_name(), Some("x.Y"));
    }

    #[test]
    fn display_formats() {
        assert_eq!(Identity::datastore("x.Y", 3).to_string(), "3[OID]x.Y");
        let app = Identity::application([IdKey::Long(1), IdKey::from("b")]);
        assert_eq!(app.to_string(), "(1, \"b\")");
        assert_eq!(
            IdentityPlaceholder::typed("x.Y", app).to_string(),
            "x.Y#(1, \"b\")"
        );
    }

    #[test]
    fn serde_roundtrip() {
        let placeholder = IdentityPlaceholder::typed(
            "com.acme.Order",
            Identity::application([IdKey::Long(5), IdKey::Uuid(Uuid::nil())]),
        );
        let json = serde_json::to_string(&placeholder).unwrap();
        let parsed: IdentityPlaceholder = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, placeholder);
    }
}
