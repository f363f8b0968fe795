use thiserror::Error;

/// Errors produced while building descriptors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("duplicate field '{field}' declared on {class}")]
    DuplicateField { class: String, field: String },

    #[error("class name must not be empty")]
    EmptyClassName,

    #[error("field name must not be empty (class {class}, position {position})")]
    EmptyFieldName { class: String, position: usize },
}

/// Result alias for descriptor operations.
pub type TypeResult<T> = Result<T, TypeError>;
