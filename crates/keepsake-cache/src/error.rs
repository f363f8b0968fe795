/// Errors from snapshot cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The instance has no identity to key its snapshot by.
    #[error("cannot cache {class}: instance has no identity")]
    MissingIdentity { class: String },

    /// The snapshot was taken against a different layout of its class.
    #[error("stale snapshot of {class}: cached {cached} fields, class now has {current}")]
    StaleSnapshot {
        class: String,
        cached: usize,
        current: usize,
    },

    /// Failure reported by a storage backend.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
