//! Foundation types for Keepsake.
//!
//! This crate provides the identity, metadata, and bookkeeping types shared
//! by the field-access barriers and the snapshot engine. Every other Keepsake
//! crate depends on `keepsake-types`.
//!
//! # Key Types
//!
//! - [`Identity`] -- Closed set of object identity representations
//! - [`IdentityPlaceholder`] -- Cache-safe stand-in for a persistable reference
//! - [`Version`] -- Optimistic version marker of a persistent object
//! - [`FieldDescriptor`] -- Per-field persistence metadata
//! - [`ClassDescriptor`] -- Managed field layout of a class and its superclasses
//! - [`WriteBarrier`] -- Write strategy selected once per field
//! - [`FieldBitSet`] -- Fixed-length bit vector indexed by absolute field number
//! - [`MetadataRegistry`] -- In-memory [`MetadataProvider`]

pub mod bitset;
pub mod class;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod strategy;
pub mod version;

pub use bitset::FieldBitSet;
pub use class::{ClassDescriptor, ClassDescriptorBuilder};
pub use descriptor::{
    ElementTraits, FieldDescriptor, FieldType, PersistenceModifier, Relation, RelationKind,
};
pub use error::{TypeError, TypeResult};
pub use identity::{IdKey, Identity, IdentityKind, IdentityPlaceholder};
pub use metadata::{MetadataProvider, MetadataRegistry};
pub use strategy::WriteBarrier;
pub use version::Version;
