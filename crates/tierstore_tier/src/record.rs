// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

use crate::{EntityKey, Gid, KeyDomain};

/// An opaque value paired with the identifier of the entity it belongs to.
///
/// Records are built by callers before they are handed to a storage
/// operation and are never mutated afterwards.
///
/// # Examples
///
/// ```
/// use tierstore_tier::{EntityKey, EntityRecord, Gid, KeyDomain};
///
/// let record = EntityRecord::new("alice".to_string(), Gid::new(9));
/// assert_eq!(record.value(), "alice");
/// assert_eq!(record.key(KeyDomain::Integer), EntityKey::Integer(9));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord<V> {
    value: V,
    gid: Gid,
}

impl<V> EntityRecord<V> {
    /// Pairs `value` with `gid`.
    pub const fn new(value: V, gid: Gid) -> Self {
        Self { value, gid }
    }

    /// Returns the wrapped value.
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// Returns the entity identifier.
    #[must_use]
    pub const fn gid(&self) -> Gid {
        self.gid
    }

    /// Derives the key this record is stored under in `domain`.
    #[must_use]
    pub fn key(&self, domain: KeyDomain) -> EntityKey {
        domain.key_for(&self.gid)
    }

    /// Consumes the record and returns the wrapped value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }
}
