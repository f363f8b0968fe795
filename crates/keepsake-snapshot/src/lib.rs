//! Cross-transaction snapshots of managed instances.
//!
//! [`SnapshotBuilder`] turns the loaded fields of a [`ManagedInstance`] into an
//! immutable [`Snapshot`] that can outlive any transaction. Snapshots never
//! hold a live persistable reference: referenced objects become identity
//! placeholders or nested snapshots, and anything that cannot be represented
//! safely is left out with its loaded bit cleared.
//!
//! Building never fails. Field-level omission is the only fallback.
//!
//! [`ManagedInstance`]: keepsake_state::ManagedInstance

pub mod adapter;
pub mod builder;
pub mod config;
pub mod container;
pub mod error;
pub mod snapshot;

pub use adapter::{IdentityAdapter, LazyWrapperAdapter, StandardAdapter};
pub use builder::SnapshotBuilder;
pub use config::SnapshotConfig;
pub use container::{ContainerFactory, ContainerShape};
pub use error::{ConfigError, ConfigResult, ContainerError, ContainerResult};
pub use snapshot::{CachedValue, Snapshot};
