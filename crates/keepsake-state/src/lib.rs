//! Managed instances and field-access interception for Keepsake.
//!
//! A [`ManagedInstance`] holds one value slot per managed field of its class
//! and may delegate to at most one [`StateAuthority`]. Every read and write of
//! a managed field goes through the barriers in [`barrier`], which decide per
//! field whether the slot or the authority is authoritative.
//!
//! # Modules
//!
//! - [`value`] -- live field values and shared container handles
//! - [`authority`] -- the [`StateAuthority`] capability contract
//! - [`instance`] -- [`ManagedInstance`] and the [`InstanceRef`] handle
//! - [`barrier`] -- write and read barrier runtime
//! - [`detached`] -- detached state and the [`DetachedStateTracker`]
//!
//! # Design Rules
//!
//! 1. Barrier strategies are selected once per field, when the class is built.
//! 2. Only the attached authority may replace itself.
//! 3. Once attached, the authority owns all bookkeeping on delegated writes.
//! 4. No locking of instance state: one thread drives a given instance.

pub mod authority;
pub mod barrier;
pub mod detached;
pub mod error;
mod exchange;
pub mod flags;
pub mod instance;
#[cfg(test)]
mod testing;
pub mod value;

pub use authority::StateAuthority;
pub use detached::{DetachedState, DetachedStateTracker};
pub use error::{StateError, StateResult};
pub use flags::InstanceFlags;
pub use instance::{InstanceRef, ManagedInstance};
pub use value::{
    CollectionType, CollectionValue, FieldValue, MapType, MapValue, OpaqueRef, Shared, Tracked,
};
