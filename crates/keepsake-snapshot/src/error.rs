use std::path::PathBuf;

/// Errors from creating replacement containers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    /// An application collection type that was never registered.
    #[error("unknown collection type '{0}'")]
    UnknownCollectionType(String),

    /// An application map type that was never registered.
    #[error("unknown map type '{0}'")]
    UnknownMapType(String),
}

/// Result alias for container creation.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors from loading [`SnapshotConfig`](crate::SnapshotConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
