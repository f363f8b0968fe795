use std::fmt;

use serde::{Deserialize, Serialize};

use crate::descriptor::{FieldDescriptor, PersistenceModifier};

/// How mutations of a field are routed.
///
/// Selected once per field when its class is built and never re-derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteBarrier {
    /// Unmanaged field: always written directly, never delegated.
    NoBarrier,
    /// Delegate to the state authority when one is attached and the
    /// instance flags are not clear.
    CheckWrite,
    /// Delegate to the state authority whenever one is attached.
    MediateWrite,
}

impl WriteBarrier {
    /// Strategy for a field, from its persistence modifier and mediated flag.
    pub fn select(field: &FieldDescriptor) -> Self {
        match field.modifier() {
            PersistenceModifier::None => Self::NoBarrier,
            PersistenceModifier::Persistent | PersistenceModifier::Transactional => {
                if field.is_mediated() {
                    Self::MediateWrite
                } else {
                    Self::CheckWrite
                }
            }
        }
    }

    /// Returns `true` if writes may be delegated to a state authority.
    pub fn is_managed(&self) -> bool {
        !matches!(self, Self::NoBarrier)
    }
}

impl fmt::Display for WriteBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBarrier => write!(f, "no-barrier"),
            Self::CheckWrite => write!(f, "check-write"),
            Self::MediateWrite => write!(f, "mediate-write"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldType;

    fn field(modifier: PersistenceModifier, mediated: bool) -> FieldDescriptor {
        FieldDescriptor::new("f", FieldType::Int)
            .with_modifier(modifier)
            .with_mediated(mediated)
    }

    #[test]
    fn unmanaged_fields_have_no_barrier() {
        assert_eq!(
            WriteBarrier::select(&field(PersistenceModifier::None, false)),
            WriteBarrier::NoBarrier
        );
        // The mediated flag is irrelevant for unmanaged fields.
        assert_eq!(
            WriteBarrier::select(&field(PersistenceModifier::None, true)),
            WriteBarrier::NoBarrier
        );
    }

    #[test]
    fn managed_fields_check_unless_mediated() {
        for modifier in [PersistenceModifier::Persistent, PersistenceModifier::Transactional] {
            assert_eq!(WriteBarrier::select(&field(modifier, false)), WriteBarrier::CheckWrite);
            assert_eq!(WriteBarrier::select(&field(modifier, true)), WriteBarrier::MediateWrite);
        }
    }

    #[test]
    fn managed_flag() {
        assert!(!WriteBarrier::NoBarrier.is_managed());
        assert!(WriteBarrier::CheckWrite.is_managed());
        assert!(WriteBarrier::MediateWrite.is_managed());
    }
}
