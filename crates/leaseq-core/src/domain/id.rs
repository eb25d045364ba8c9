//! Strongly-typed item identifier.

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of a work item, assigned by the store at insertion.
///
/// ULIDs sort by their timestamp component, so the derived `Ord` gives
/// insertion order. Claim uses that as the deterministic tie-break between
/// items of equal priority.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Ulid);

impl ItemId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Build from an explicit timestamp and entropy, so stores can derive
    /// the timestamp half from their own clock.
    pub fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(Ulid::from_parts(timestamp_ms, random))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for ItemId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}
