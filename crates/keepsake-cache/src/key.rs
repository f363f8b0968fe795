use std::fmt;

use keepsake_types::{Identity, IdentityPlaceholder};
use serde::{Deserialize, Serialize};

/// Key of a cached snapshot: the object's class and identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub class_name: String,
    pub identity: Identity,
}

impl CacheKey {
    /// Key for the object of `class_name` with `identity`.
    pub fn new(class_name: impl Into<String>, identity: Identity) -> Self {
        Self {
            class_name: class_name.into(),
            identity,
        }
    }

    /// Key of the object a placeholder stands for.
    ///
    /// Returns `None` for a verbatim placeholder whose identity does not name
    /// its class.
    pub fn from_placeholder(placeholder: &IdentityPlaceholder) -> Option<Self> {
        let class_name = placeholder.class_name()?.to_owned();
        Some(Self::new(class_name, placeholder.identity().clone()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.identity)
    }
}
