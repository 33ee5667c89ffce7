//! Core UVN membership model: the UVN itself, its cells and particles, and
//! the runtime peer record that tracks liveness and routing state.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::ids::{CellId, IdAllocator, ParticleId, PeerId};
use crate::net::LanDescriptor;
use crate::settings::UvnSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    pub owner: String,
    pub public_address: Option<Ipv4Addr>,
    pub allowed_lans: Vec<Ipv4Network>,
    pub enable_particles_vpn: bool,
}

impl Cell {
    pub fn is_private(&self) -> bool {
        self.public_address.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Particle {
    pub id: ParticleId,
    pub name: String,
    pub owner: String,
}

/// Errors raised while mutating UVN membership. These are all
/// `Severity::Configuration` — rejected at the registry, never produced.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum UvnError {
    #[error("name '{0}' already used by a cell, particle or the UVN itself")]
    NameClash(String),
    #[error("cell {a} and cell {b} have overlapping allowed_lans ({net})")]
    OverlappingLans {
        a: CellId,
        b: CellId,
        net: Ipv4Network,
    },
    #[error("cell {a} and cell {b} share the same public address {addr}")]
    DuplicatePublicAddress {
        a: CellId,
        b: CellId,
        addr: Ipv4Addr,
    },
    #[error("cell {0} not found")]
    CellNotFound(CellId),
    #[error("particle {0} not found")]
    ParticleNotFound(ParticleId),
    #[error("cell {0} is banned and cannot be reused")]
    CellBanned(CellId),
    #[error("particle {0} is banned and cannot be reused")]
    ParticleBanned(ParticleId),
}

impl crate::errors::Classified for UvnError {
    fn severity(&self) -> crate::errors::Severity {
        crate::errors::Severity::Configuration
    }
}

/// Named, identity-owned membership and settings for a unified virtual
/// network. Cell and particle IDs are the smallest positive integers not
/// yet used; banned entities occupy a parallel exclusion set so their IDs
/// are never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uvn {
    pub name: String,
    pub owner: String,
    pub settings: UvnSettings,
    cells: BTreeMap<CellId, Cell>,
    particles: BTreeMap<ParticleId, Particle>,
    excluded_cells: BTreeMap<CellId, Cell>,
    excluded_particles: BTreeMap<ParticleId, Particle>,
    cell_ids: IdAllocator,
    particle_ids: IdAllocator,
}

impl Uvn {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            settings: UvnSettings::default(),
            cells: BTreeMap::new(),
            particles: BTreeMap::new(),
            excluded_cells: BTreeMap::new(),
            excluded_particles: BTreeMap::new(),
            cell_ids: IdAllocator::new(),
            particle_ids: IdAllocator::new(),
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.values()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(&id)
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        std::iter::once(PeerId::Registry)
            .chain(self.cells.keys().map(|id| PeerId::Cell(*id)))
            .chain(self.particles.keys().map(|id| PeerId::Particle(*id)))
    }

    fn name_taken(&self, name: &str) -> bool {
        name == self.name
            || self.cells.values().any(|c| c.name == name)
            || self.particles.values().any(|p| p.name == name)
    }

    fn check_no_lan_overlap(&self, candidate: &Cell) -> Result<(), UvnError> {
        for other in self.cells.values() {
            if other.id == candidate.id {
                continue;
            }
            for a in &candidate.allowed_lans {
                for b in &other.allowed_lans {
                    if networks_overlap(a, b) {
                        return Err(UvnError::OverlappingLans {
                            a: candidate.id,
                            b: other.id,
                            net: *a,
                        });
                    }
                }
            }
            if let (Some(x), Some(y)) = (candidate.public_address, other.public_address) {
                if x == y {
                    return Err(UvnError::DuplicatePublicAddress {
                        a: candidate.id,
                        b: other.id,
                        addr: x,
                    });
                }
            }
        }
        Ok(())
    }

    /// Adds a new cell, assigning it the smallest unused, non-banned ID.
    pub fn add_cell(
        &mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        public_address: Option<Ipv4Addr>,
        allowed_lans: Vec<Ipv4Network>,
        enable_particles_vpn: bool,
    ) -> Result<CellId, UvnError> {
        let name = name.into();
        if self.name_taken(&name) {
            return Err(UvnError::NameClash(name));
        }
        let id = CellId::new(self.cell_ids.allocate());
        let cell = Cell {
            id,
            name,
            owner: owner.into(),
            public_address,
            allowed_lans,
            enable_particles_vpn,
        };
        self.check_no_lan_overlap(&cell)?;
        self.cells.insert(id, cell);
        Ok(id)
    }

    pub fn update_cell(&mut self, id: CellId, f: impl FnOnce(&mut Cell)) -> Result<(), UvnError> {
        let mut candidate = self.cells.get(&id).cloned().ok_or(UvnError::CellNotFound(id))?;
        f(&mut candidate);
        self.check_no_lan_overlap(&candidate)?;
        self.cells.insert(id, candidate);
        Ok(())
    }

    /// Bans a cell: it moves to the excluded set and its ID is never
    /// reused by `add_cell` until an explicit `unban_cell`.
    pub fn ban_cell(&mut self, id: CellId) -> Result<(), UvnError> {
        let cell = self.cells.remove(&id).ok_or(UvnError::CellNotFound(id))?;
        self.cell_ids.release_to_excluded(id.get());
        self.excluded_cells.insert(id, cell);
        Ok(())
    }

    /// Restores a banned cell under its original ID, recorded in `cells`
    /// again (the quantified invariant in the testable properties section).
    pub fn unban_cell(&mut self, id: CellId) -> Result<(), UvnError> {
        let cell = self
            .excluded_cells
            .remove(&id)
            .ok_or(UvnError::CellNotFound(id))?;
        self.cell_ids.mark_used(id.get());
        self.cells.insert(id, cell);
        Ok(())
    }

    pub fn delete_cell(&mut self, id: CellId) -> Result<(), UvnError> {
        self.cells.remove(&id).ok_or(UvnError::CellNotFound(id))?;
        Ok(())
    }

    pub fn add_particle(
        &mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
    ) -> Result<ParticleId, UvnError> {
        let name = name.into();
        if self.name_taken(&name) {
            return Err(UvnError::NameClash(name));
        }
        let id = ParticleId::new(self.particle_ids.allocate());
        self.particles.insert(
            id,
            Particle {
                id,
                name,
                owner: owner.into(),
            },
        );
        Ok(id)
    }

    pub fn ban_particle(&mut self, id: ParticleId) -> Result<(), UvnError> {
        let p = self
            .particles
            .remove(&id)
            .ok_or(UvnError::ParticleNotFound(id))?;
        self.particle_ids.release_to_excluded(id.get());
        self.excluded_particles.insert(id, p);
        Ok(())
    }

    pub fn unban_particle(&mut self, id: ParticleId) -> Result<(), UvnError> {
        let p = self
            .excluded_particles
            .remove(&id)
            .ok_or(UvnError::ParticleNotFound(id))?;
        self.particle_ids.mark_used(id.get());
        self.particles.insert(id, p);
        Ok(())
    }

    pub fn delete_particle(&mut self, id: ParticleId) -> Result<(), UvnError> {
        self.particles
            .remove(&id)
            .ok_or(UvnError::ParticleNotFound(id))?;
        Ok(())
    }

    pub fn private_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values().filter(|c| c.is_private())
    }

    pub fn public_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values().filter(|c| !c.is_private())
    }
}

fn networks_overlap(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Runtime status of a peer as seen by the local agent or registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerStatus {
    Declared,
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerKind {
    Registry,
    Cell,
    Particle,
}

/// Per-tunnel-link liveness snapshot, as reported by the tunnel driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnLinkStatus {
    pub online: bool,
    pub last_handshake: Option<chrono::DateTime<chrono::Utc>>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// A member of the UVN as tracked by the Peers registry.
/// Lifecycle: created `Declared` from UVN membership; becomes `Online`
/// when a matching remote writer appears or a sample is received from it;
/// becomes `Offline` on liveliness loss or explicit disposal; can return
/// to `Online` on rediscovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: PeerId,
    pub kind: PeerKind,
    pub status: PeerStatus,
    /// Hash of the configuration generation this peer last reported.
    pub registry_id: Option<String>,
    pub routed_networks: Vec<LanDescriptor>,
    pub reachable_networks: Vec<LanDescriptor>,
    pub unreachable_networks: Vec<LanDescriptor>,
    pub vpn_link_status: BTreeMap<String, VpnLinkStatus>,
    pub start_ts: Option<chrono::DateTime<chrono::Utc>>,
}

impl PeerRecord {
    pub fn declared(id: PeerId, kind: PeerKind) -> Self {
        Self {
            id,
            kind,
            status: PeerStatus::Declared,
            registry_id: None,
            routed_networks: Vec::new(),
            reachable_networks: Vec::new(),
            unreachable_networks: Vec::new(),
            vpn_link_status: BTreeMap::new(),
            start_ts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn cell_ids_are_smallest_unused_positive_integers() {
        let mut uvn = Uvn::new("test", "alice");
        let a = uvn.add_cell("a", "alice", None, vec![], false).unwrap();
        let b = uvn.add_cell("b", "alice", None, vec![], false).unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn ban_then_unban_preserves_id_and_membership() {
        let mut uvn = Uvn::new("test", "alice");
        let a = uvn.add_cell("a", "alice", None, vec![], false).unwrap();
        uvn.ban_cell(a).unwrap();
        assert!(uvn.cell(a).is_none());
        uvn.unban_cell(a).unwrap();
        assert!(uvn.cell(a).is_some());
        assert_eq!(uvn.cell(a).unwrap().id, a);
    }

    #[test]
    fn banned_cell_id_is_never_reused_while_excluded() {
        let mut uvn = Uvn::new("test", "alice");
        let a = uvn.add_cell("a", "alice", None, vec![], false).unwrap();
        uvn.ban_cell(a).unwrap();
        let b = uvn.add_cell("b", "alice", None, vec![], false).unwrap();
        assert_ne!(a, b);
        assert_eq!(b.get(), 2);
    }

    #[test]
    fn overlapping_lans_are_rejected() {
        let mut uvn = Uvn::new("test", "alice");
        uvn.add_cell("a", "alice", None, vec![net("192.168.1.0/24")], false)
            .unwrap();
        let err = uvn
            .add_cell("b", "alice", None, vec![net("192.168.1.128/25")], false)
            .unwrap_err();
        assert!(matches!(err, UvnError::OverlappingLans { .. }));
    }

    #[test]
    fn duplicate_public_address_is_rejected() {
        let mut uvn = Uvn::new("test", "alice");
        uvn.add_cell(
            "a",
            "alice",
            Some("1.2.3.4".parse().unwrap()),
            vec![],
            false,
        )
        .unwrap();
        let err = uvn
            .add_cell(
                "b",
                "alice",
                Some("1.2.3.4".parse().unwrap()),
                vec![],
                false,
            )
            .unwrap_err();
        assert!(matches!(err, UvnError::DuplicatePublicAddress { .. }));
    }
}
