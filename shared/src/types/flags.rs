//! Replication event flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Flags attached to a replicated revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationFlag {
    /// The revision is a deletion (tombstone)
    Deleted,
    /// The remote revoked this client's access to the document
    AccessRemoved,
}

impl ReplicationFlag {
    const fn bit(self) -> u8 {
        match self {
            ReplicationFlag::Deleted => 0b01,
            ReplicationFlag::AccessRemoved => 0b10,
        }
    }
}

/// Set of [`ReplicationFlag`]s for one replication event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagSet {
    bits: u8,
}

impl FlagSet {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Return a copy of this set with `flag` added
    pub const fn with(self, flag: ReplicationFlag) -> Self {
        Self {
            bits: self.bits | flag.bit(),
        }
    }

    pub fn insert(&mut self, flag: ReplicationFlag) {
        self.bits |= flag.bit();
    }

    pub const fn contains(&self, flag: ReplicationFlag) -> bool {
        self.bits & flag.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub const fn deleted(&self) -> bool {
        self.contains(ReplicationFlag::Deleted)
    }

    pub const fn access_removed(&self) -> bool {
        self.contains(ReplicationFlag::AccessRemoved)
    }
}

impl FromIterator<ReplicationFlag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = ReplicationFlag>>(iter: I) -> Self {
        let mut set = FlagSet::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

/// Direction a filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationDirection {
    Push,
    Pull,
}

impl fmt::Display for ReplicationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationDirection::Push => f.write_str("push"),
            ReplicationDirection::Pull => f.write_str("pull"),
        }
    }
}
