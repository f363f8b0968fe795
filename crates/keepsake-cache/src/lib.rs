//! Snapshot cache for Keepsake.
//!
//! Snapshots built by `keepsake-snapshot` are kept in a [`CacheStore`] under a
//! [`CacheKey`] and copied back into fresh instances by a
//! [`SnapshotRestorer`]. [`SnapshotCache`] wires the builder, a store, and the
//! metadata registry together.
//!
//! # Storage Backends
//!
//! - [`InMemoryCacheStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Stored snapshots are immutable and shared as `Arc<Snapshot>`.
//! 2. A restored instance never shares a mutable cell with its snapshot.
//! 3. A snapshot whose class layout changed is reported stale, never evicted
//!    on the caller's behalf.

pub mod cache;
pub mod error;
pub mod key;
pub mod memory;
pub mod restore;
pub mod traits;

pub use cache::SnapshotCache;
pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use memory::InMemoryCacheStore;
pub use restore::{IdentityResolver, Restored, SnapshotRestorer};
pub use traits::CacheStore;
