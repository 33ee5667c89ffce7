//! Stable small-integer identifiers.
//!
//! Cells, particles and peers are referenced by these IDs rather than by
//! pointer/reference, so none of the core types hold a reference into the
//! `Uvn` that could dangle across a hot reload (see design note on arenas
//! over pointer graphs).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! small_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(v: u32) -> Self {
                Self(v)
            }

            pub fn get(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }
    };
}

small_id!(CellId);
small_id!(ParticleId);

/// Identifies a member of the UVN regardless of kind, for use in the peer
/// registry and control-plane topics where cells, particles and the
/// registry itself share one namespace of "peers".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PeerId {
    Registry,
    Cell(CellId),
    Particle(ParticleId),
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry => write!(f, "registry"),
            Self::Cell(id) => write!(f, "cell/{id}"),
            Self::Particle(id) => write!(f, "particle/{id}"),
        }
    }
}

/// Allocates the smallest positive integer not yet in use, honoring a set
/// of permanently excluded (banned) IDs that must never be reused.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    used: std::collections::BTreeSet<u32>,
    excluded: std::collections::BTreeSet<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the smallest positive integer not in `used` or `excluded`,
    /// and marks it used.
    pub fn allocate(&mut self) -> u32 {
        let mut candidate = 1u32;
        while self.used.contains(&candidate) || self.excluded.contains(&candidate) {
            candidate += 1;
        }
        self.used.insert(candidate);
        candidate
    }

    pub fn release_to_excluded(&mut self, id: u32) {
        self.used.remove(&id);
        self.excluded.insert(id);
    }

    /// Restores a previously banned ID to the pool of reusable IDs. Used
    /// when reviewing the invariant that `unban` brings an ID back intact;
    /// callers that want the original ID preserved must resurrect the
    /// entity under the same ID, not call this.
    pub fn is_excluded(&self, id: u32) -> bool {
        self.excluded.contains(&id)
    }

    pub fn mark_used(&mut self, id: u32) {
        self.used.insert(id);
    }
}
