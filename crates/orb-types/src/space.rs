use std::fmt;

use serde::{Deserialize, Serialize};

use crate::oid::Oid;

/// Identifier of a persistence space.
///
/// A space is a logical grouping of objects used only to partition
/// snapshots into files — it is never part of an object's identity.
/// Every object belongs to exactly one space.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpaceId(Oid);

impl SpaceId {
    /// The well-known root space every runtime starts with.
    pub const ROOT: SpaceId = SpaceId(Oid::from_raw(3_413_820_300_735_010_366, 446_538_579));

    /// Wrap an oid as a space identifier.
    ///
    /// # Panics
    ///
    /// Panics if the oid is not valid — a space without a proper name
    /// could never map to a snapshot file.
    pub fn new(oid: Oid) -> Self {
        assert!(oid.is_valid(), "space id must be a valid oid, got {oid}");
        Self(oid)
    }

    /// The underlying oid.
    pub const fn oid(self) -> Oid {
        self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpaceId({})", self.0)
    }
}
