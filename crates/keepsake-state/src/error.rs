use keepsake_types::FieldType;

/// Errors from field access on a managed instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The absolute index does not address a managed field of the class.
    #[error("{class} has no managed field at index {index}")]
    UnknownField { class: String, index: usize },

    /// No managed field of the class has this name.
    #[error("{class} has no managed field named '{name}'")]
    UnknownFieldName { class: String, name: String },

    /// The value cannot be stored in a field of the declared type.
    #[error("field '{field}' of type {expected} cannot hold a {found} value")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
}

/// Result alias for field access.
pub type StateResult<T> = Result<T, StateError>;
