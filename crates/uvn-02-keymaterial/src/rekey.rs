//! Rekeying scope.
//!
//! A rekey is always scoped: a single cell, a single particle, or the
//! whole UVN, with independent `drop_keys_root_vpn`/`drop_keys_particles_vpn`/
//! `drop_keys_dds` flags rather than one coarse switch, so an operator can
//! force fresh WireGuard keys without also forcing fresh DDS credentials
//! (or vice versa).

use serde::{Deserialize, Serialize};
use shared_types::ids::{CellId, ParticleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RekeyScope {
    Cell(CellId),
    Particle(ParticleId),
    Uvn {
        drop_keys_root_vpn: bool,
        drop_keys_particles_vpn: bool,
        drop_keys_dds: bool,
    },
}

/// A rekey produces a parallel next-generation identity: the old
/// generation's certificates remain valid (peers may still be running on
/// them) until the registry observes every affected cell reporting the
/// new `registry_id` (`Registry::spin_until_rekeyed`, §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub scope: RekeyScope,
}
