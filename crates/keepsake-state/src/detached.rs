//! State kept by an instance while no authority is attached.

use keepsake_types::{FieldBitSet, Identity, Version};
use serde::{Deserialize, Serialize};

/// Records which fields were written while the instance was detached.
///
/// Sized to the full field count of the class chain. Bits are only ever set
/// here; reconciling them on reattachment is the authority's job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedStateTracker {
    bits: FieldBitSet,
}

impl DetachedStateTracker {
    /// An empty tracker for a class chain of `field_count` fields.
    pub fn new(field_count: usize) -> Self {
        Self {
            bits: FieldBitSet::new(field_count),
        }
    }

    /// Mark field `index` as modified. Returns `true` if it was not marked yet.
    pub fn set(&mut self, index: usize) -> bool {
        self.bits.insert(index)
    }

    /// Returns `true` if field `index` was modified.
    pub fn is_set(&self, index: usize) -> bool {
        self.bits.contains(index)
    }

    /// Returns `true` if any field was modified.
    pub fn any(&self) -> bool {
        self.bits.any()
    }

    /// Number of tracked fields.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` if the tracker covers no fields.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Modified field indices, ascending.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter()
    }

    /// Modified fields as a bitset.
    pub fn bits(&self) -> &FieldBitSet {
        &self.bits
    }
}

/// Identity, version, loaded fields, and modified fields of a detached
/// instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedState {
    identity: Option<Identity>,
    version: Option<Version>,
    loaded: FieldBitSet,
    modified: DetachedStateTracker,
}

impl DetachedState {
    /// Detached state with `loaded` fields and nothing modified yet.
    ///
    /// Both bitsets are sized to the instance's class when the state is
    /// attached to an instance.
    pub fn new(loaded: FieldBitSet) -> Self {
        let modified = DetachedStateTracker::new(loaded.len());
        Self {
            identity: None,
            version: None,
            loaded,
            modified,
        }
    }

    /// Set the identity of the detached object.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the version the object had when it was detached.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Identity of the detached object.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Version of the detached object.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Fields that were loaded when the instance was detached.
    pub fn loaded(&self) -> &FieldBitSet {
        &self.loaded
    }

    /// Fields written since the instance was detached.
    pub fn modified(&self) -> &DetachedStateTracker {
        &self.modified
    }

    pub(crate) fn modified_mut(&mut self) -> &mut DetachedStateTracker {
        &mut self.modified
    }

    /// Size both bitsets to `field_count`.
    pub(crate) fn fit(&mut self, field_count: usize) {
        self.loaded.resize(field_count);
        self.modified.bits.resize(field_count);
    }
}
