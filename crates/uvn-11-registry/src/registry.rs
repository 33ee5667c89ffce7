//! The registry (§4.11): owns UVN membership and key material, tracks
//! which generated artifacts are stale, and regenerates them on `save()`.
//! Grounded on the reference `Registry.configure`/`Registry.deploy`: a
//! cell or particle mutation dirties exactly the artifacts that actually
//! depend on it (root/particles VPN on any cell or UVN-level settings
//! change, backbone VPN on cell topology change or an explicit
//! `redeploy()`), never the whole world.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::Utc;

use shared_types::errors::Classified;
use shared_types::ids::{CellId, ParticleId, PeerId};
use shared_types::settings::UvnSettings;
use shared_types::uvn::{Cell, Uvn};
use uvn_02_keymaterial::{KeyMaterial, RekeyScope};
use uvn_03_deployment::Deployment;
use uvn_04_vpnconfig::keymat::{CentralizedVpnKeyMaterial, P2PVpnKeyMaterial};
use uvn_04_vpnconfig::{centralized_configs, peer_to_peer_configs, TunnelConfig};
use uvn_10_controlplane::topics::{AGENT_CELL_TOPICS, AGENT_REGISTRY_TOPICS};

use crate::bundle::{build_cell_bundle, build_particle_package, AgentConfig, ParticlePackage};
use crate::errors::RegistryError;
use crate::rekey::RekeySpin;

#[derive(Debug, Default, Clone, Copy)]
struct DirtyFlags {
    keymat: bool,
    root_vpn: bool,
    particles_vpn: bool,
    backbone_vpn: bool,
}

impl DirtyFlags {
    fn any(&self) -> bool {
        self.keymat || self.root_vpn || self.particles_vpn || self.backbone_vpn
    }

    fn mark_cell_change(&mut self) {
        self.keymat = true;
        self.root_vpn = true;
        self.particles_vpn = true;
        self.backbone_vpn = true;
    }

    fn mark_particle_change(&mut self) {
        self.keymat = true;
        self.particles_vpn = true;
    }

    fn mark_settings_change(&mut self) {
        self.keymat = true;
        self.root_vpn = true;
        self.particles_vpn = true;
        self.backbone_vpn = true;
    }
}

/// Central authority for one UVN: membership, identity, deployment and
/// every generated tunnel config, plus the packaged bundles agents and
/// particles are handed. Never runs a tunnel, NAT rule or router itself
/// (§3 Ownership belongs to the Agent).
pub struct Registry {
    pub uvn: Uvn,
    keymat: KeyMaterial,
    registry_id: String,
    registry_public_address: Option<Ipv4Addr>,
    root_keymat: CentralizedVpnKeyMaterial,
    particles_keymat: CentralizedVpnKeyMaterial,
    backbone_keymat: P2PVpnKeyMaterial,
    deployment: Option<Deployment>,
    root_vpn_peers: BTreeMap<PeerId, TunnelConfig>,
    particles_vpn_root_cell: Option<CellId>,
    particles_vpn_peers: BTreeMap<PeerId, TunnelConfig>,
    backbone_vpn: BTreeMap<CellId, Vec<TunnelConfig>>,
    cell_bundles: BTreeMap<CellId, Vec<u8>>,
    particle_packages: BTreeMap<ParticleId, Vec<u8>>,
    dirty: DirtyFlags,
    pending_rekey: Option<RekeySpin>,
}

impl Registry {
    #[tracing::instrument(skip_all, fields(uvn = %name))]
    pub fn init(name: impl Into<String>, owner: impl Into<String>) -> Result<Self, RegistryError> {
        let name = name.into();
        let uvn = Uvn::new(name.clone(), owner);
        let mut keymat = KeyMaterial::init(&name)?;
        keymat.assert_peer(PeerId::Registry, AGENT_REGISTRY_TOPICS, &["CELL"])?;
        Ok(Self {
            uvn,
            keymat,
            registry_id: next_registry_id(),
            registry_public_address: None,
            root_keymat: CentralizedVpnKeyMaterial::new(),
            particles_keymat: CentralizedVpnKeyMaterial::new(),
            backbone_keymat: P2PVpnKeyMaterial::new(),
            deployment: None,
            root_vpn_peers: BTreeMap::new(),
            particles_vpn_root_cell: None,
            particles_vpn_peers: BTreeMap::new(),
            backbone_vpn: BTreeMap::new(),
            cell_bundles: BTreeMap::new(),
            particle_packages: BTreeMap::new(),
            dirty: DirtyFlags {
                keymat: true,
                root_vpn: true,
                particles_vpn: true,
                backbone_vpn: true,
            },
            pending_rekey: None,
        })
    }

    pub fn registry_id(&self) -> &str {
        &self.registry_id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.any()
    }

    pub fn set_registry_public_address(&mut self, addr: Option<Ipv4Addr>) {
        self.registry_public_address = addr;
        self.dirty.root_vpn = true;
    }

    // -- membership -----------------------------------------------------

    pub fn add_cell(
        &mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        public_address: Option<Ipv4Addr>,
        allowed_lans: Vec<ipnetwork::Ipv4Network>,
        enable_particles_vpn: bool,
    ) -> Result<CellId, RegistryError> {
        let id = self
            .uvn
            .add_cell(name, owner, public_address, allowed_lans, enable_particles_vpn)?;
        self.dirty.mark_cell_change();
        Ok(id)
    }

    pub fn update_cell(&mut self, id: CellId, f: impl FnOnce(&mut Cell)) -> Result<(), RegistryError> {
        self.uvn.update_cell(id, f)?;
        self.dirty.mark_cell_change();
        Ok(())
    }

    pub fn ban_cell(&mut self, id: CellId) -> Result<(), RegistryError> {
        self.uvn.ban_cell(id)?;
        let remaining: Vec<PeerId> = self.uvn.peer_ids().collect();
        self.root_keymat.purge_gone_peers(&remaining);
        self.cell_bundles.remove(&id);
        self.dirty.mark_cell_change();
        Ok(())
    }

    pub fn unban_cell(&mut self, id: CellId) -> Result<(), RegistryError> {
        self.uvn.unban_cell(id)?;
        self.dirty.mark_cell_change();
        Ok(())
    }

    pub fn delete_cell(&mut self, id: CellId) -> Result<(), RegistryError> {
        self.uvn.delete_cell(id)?;
        self.cell_bundles.remove(&id);
        self.dirty.mark_cell_change();
        Ok(())
    }

    pub fn add_particle(&mut self, name: impl Into<String>, owner: impl Into<String>) -> Result<ParticleId, RegistryError> {
        let id = self.uvn.add_particle(name, owner)?;
        self.dirty.mark_particle_change();
        Ok(id)
    }

    pub fn ban_particle(&mut self, id: ParticleId) -> Result<(), RegistryError> {
        self.uvn.ban_particle(id)?;
        self.particle_packages.remove(&id);
        self.dirty.mark_particle_change();
        Ok(())
    }

    pub fn unban_particle(&mut self, id: ParticleId) -> Result<(), RegistryError> {
        self.uvn.unban_particle(id)?;
        self.dirty.mark_particle_change();
        Ok(())
    }

    pub fn delete_particle(&mut self, id: ParticleId) -> Result<(), RegistryError> {
        self.uvn.delete_particle(id)?;
        self.particle_packages.remove(&id);
        self.dirty.mark_particle_change();
        Ok(())
    }

    /// Applies `f` to the UVN-wide settings and dirties every generated
    /// artifact, matching the reference's blanket `configure(**settings)`
    /// behavior (no finer dependency tracking exists at the settings
    /// level, unlike per-cell/per-particle mutation).
    pub fn configure_settings(&mut self, f: impl FnOnce(&mut UvnSettings)) {
        f(&mut self.uvn.settings);
        self.dirty.mark_settings_change();
    }

    /// Forces backbone VPN regeneration even with no membership change —
    /// the explicit `redeploy` verb (§6).
    pub fn redeploy(&mut self) {
        self.dirty.backbone_vpn = true;
    }

    // -- regeneration -----------------------------------------------------

    /// Regenerates whatever artifacts are stale and clears the dirty
    /// flags that were satisfied. Idempotent: calling `save()` twice with
    /// no mutation in between is a no-op (byte-identical bundles, modulo
    /// `registry_id`/timestamps already stable across calls since
    /// `assert_peer`/`assert_link_secret` are themselves idempotent).
    #[tracing::instrument(skip_all, fields(uvn = %self.uvn.name))]
    pub fn save(&mut self) -> Result<(), RegistryError> {
        let _timer = uvn_telemetry::metrics::time_histogram!(uvn_telemetry::metrics::CONFIG_GENERATION_DURATION);
        let result = self.save_inner();
        uvn_telemetry::metrics::CONFIG_GENERATIONS_TOTAL.inc();
        if let Err(ref e) = result {
            let severity = e.severity().to_string();
            uvn_telemetry::metrics::COMPONENT_ERRORS
                .with_label_values(&["registry", &severity])
                .inc();
        }
        result
    }

    fn save_inner(&mut self) -> Result<(), RegistryError> {
        if self.dirty.keymat {
            self.sync_keymaterial()?;
            self.dirty.keymat = false;
        }
        if self.dirty.root_vpn && self.uvn.settings.enable_root_vpn {
            self.regenerate_root_vpn()?;
            self.dirty.root_vpn = false;
        }
        if self.dirty.particles_vpn && self.uvn.settings.enable_particles_vpn {
            self.regenerate_particles_vpn()?;
            self.dirty.particles_vpn = false;
        }
        if self.dirty.backbone_vpn {
            self.regenerate_backbone_vpn()?;
            self.dirty.backbone_vpn = false;
        }
        self.regenerate_bundles()?;
        tracing::info!(registry_id = %self.registry_id, "registry state saved");
        Ok(())
    }

    fn sync_keymaterial(&mut self) -> Result<(), RegistryError> {
        for cell in self.uvn.cells() {
            self.keymat.assert_peer(PeerId::Cell(cell.id), &["CELL"], AGENT_CELL_TOPICS)?;
        }
        for particle in self.uvn.particles() {
            self.keymat.assert_peer(PeerId::Particle(particle.id), &[], &[])?;
        }
        Ok(())
    }

    fn regenerate_root_vpn(&mut self) -> Result<(), RegistryError> {
        let peers: Vec<(PeerId, Option<Ipv4Addr>)> =
            self.uvn.cells().map(|c| (PeerId::Cell(c.id), c.public_address)).collect();
        if peers.is_empty() {
            self.root_vpn_peers.clear();
            return Ok(());
        }
        let (_root, peer_configs) =
            centralized_configs(&self.uvn.settings.root_vpn, self.registry_public_address, &peers, &mut self.root_keymat)?;
        self.root_vpn_peers = peer_configs.into_iter().collect();
        Ok(())
    }

    /// The particles-VPN root is hosted by whichever cell has
    /// `enable_particles_vpn` set (ascending id if more than one — the
    /// source's semantics for multiple enabling cells is unspecified, see
    /// DESIGN.md); that cell's own config is a root tunnel, every other
    /// cell gets none, and particles get the usual client configs.
    fn regenerate_particles_vpn(&mut self) -> Result<(), RegistryError> {
        let Some(root_cell) = self.uvn.cells().filter(|c| c.enable_particles_vpn).min_by_key(|c| c.id) else {
            self.particles_vpn_root_cell = None;
            self.particles_vpn_peers.clear();
            return Ok(());
        };
        let root_addr = root_cell.public_address;
        let root_id = root_cell.id;

        let peers: Vec<(PeerId, Option<Ipv4Addr>)> = self.uvn.particles().map(|p| (PeerId::Particle(p.id), None)).collect();
        if peers.is_empty() {
            self.particles_vpn_root_cell = Some(root_id);
            self.particles_vpn_peers.clear();
            return Ok(());
        }

        let (root, peer_configs) =
            centralized_configs(&self.uvn.settings.particles_vpn, root_addr, &peers, &mut self.particles_keymat)?;
        self.particles_vpn_root_cell = Some(root_id);
        self.particles_vpn_peers = peer_configs.into_iter().collect();
        self.particles_vpn_peers.insert(PeerId::Cell(root_id), root);
        Ok(())
    }

    fn regenerate_backbone_vpn(&mut self) -> Result<(), RegistryError> {
        let cells: Vec<Cell> = self.uvn.cells().cloned().collect();
        let deployment = Deployment::compute(&cells, &self.uvn.settings.backbone_vpn, Utc::now())?;
        let configs = peer_to_peer_configs(&deployment, &self.uvn.settings.backbone_vpn, &cells, &mut self.backbone_keymat);
        self.deployment = Some(deployment);
        self.backbone_vpn = configs;
        Ok(())
    }

    fn regenerate_bundles(&mut self) -> Result<(), RegistryError> {
        let deployment = self.deployment.clone();
        for cell in self.uvn.cells() {
            let root_vpn = self.root_vpn_peers.get(&PeerId::Cell(cell.id)).cloned();
            let particles_vpn = if self.particles_vpn_root_cell == Some(cell.id) {
                self.particles_vpn_peers.get(&PeerId::Cell(cell.id)).cloned()
            } else {
                None
            };
            let backbone_vpn = self.backbone_vpn.get(&cell.id).cloned().unwrap_or_default();
            let backbone_slot = deployment
                .as_ref()
                .and_then(|d| d.peers.get(&cell.id))
                .cloned()
                .unwrap_or_default();

            let config = AgentConfig {
                uvn_name: self.uvn.name.clone(),
                registry_id: self.registry_id.clone(),
                cell_id: cell.id,
                timing_profile: self.uvn.settings.timing_profile,
                settings: self.uvn.settings.clone(),
                allowed_lans: cell.allowed_lans.clone(),
                root_vpn,
                particles_vpn,
                backbone_vpn,
                backbone_slot,
            };
            let bundle = build_cell_bundle(&self.keymat, cell.id, &config)?;
            self.cell_bundles.insert(cell.id, bundle);
        }

        for particle in self.uvn.particles() {
            let Some(tunnel) = self.particles_vpn_peers.get(&PeerId::Particle(particle.id)).cloned() else {
                continue;
            };
            let package = ParticlePackage {
                uvn_name: self.uvn.name.clone(),
                registry_id: self.registry_id.clone(),
                particle_id: particle.id,
                particles_vpn: tunnel,
            };
            let bytes = build_particle_package(&self.keymat, particle.id, &package)?;
            self.particle_packages.insert(particle.id, bytes);
        }
        Ok(())
    }

    pub fn cell_bundle(&self, id: CellId) -> Result<&[u8], RegistryError> {
        self.cell_bundles.get(&id).map(Vec::as_slice).ok_or(RegistryError::NoBundleFor(id))
    }

    pub fn particle_package(&self, id: ParticleId) -> Result<&[u8], RegistryError> {
        self.particle_packages.get(&id).map(Vec::as_slice).ok_or(RegistryError::NoPackageFor(id))
    }

    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    // -- rekeying ---------------------------------------------------------

    /// Starts a rekey: re-issues the scoped identities, publishes a new
    /// `registry_id`, and returns the [`RekeySpin`] the caller drives
    /// (feeding it observed `CELL` samples) until every affected cell has
    /// acknowledged the new generation or `max_spin_time` elapses.
    #[tracing::instrument(skip(self), fields(uvn = %self.uvn.name))]
    pub fn begin_rekey(&mut self, scope: RekeyScope, max_spin_time: Duration) -> Result<&mut RekeySpin, RegistryError> {
        let expected: std::collections::BTreeSet<CellId> = match &scope {
            RekeyScope::Cell(id) => [*id].into_iter().collect(),
            RekeyScope::Particle(_) => std::collections::BTreeSet::new(),
            RekeyScope::Uvn { .. } => self.uvn.cells().map(|c| c.id).collect(),
        };

        match &scope {
            RekeyScope::Cell(_) => self.keymat.rekey_cell(scope.clone())?,
            RekeyScope::Particle(id) => self.keymat.rekey_particle(*id)?,
            RekeyScope::Uvn { .. } => self.keymat.rekey_uvn(scope.clone())?,
        }

        let old_id = self.registry_id.clone();
        let new_id = next_registry_id();
        self.registry_id = new_id.clone();
        self.dirty.mark_settings_change();

        tracing::info!(old_registry_id = %old_id, new_registry_id = %new_id, "rekey started");
        self.pending_rekey = Some(RekeySpin::new(scope, old_id, new_id, expected, max_spin_time));
        Ok(self.pending_rekey.as_mut().expect("just inserted"))
    }

    pub fn pending_rekey(&mut self) -> Option<&mut RekeySpin> {
        self.pending_rekey.as_mut()
    }

    /// Clears a completed (or abandoned) rekey transition.
    pub fn finish_rekey(&mut self) -> Result<RekeyScope, RegistryError> {
        let spin = self.pending_rekey.take().ok_or(RegistryError::NoRekeyInProgress)?;
        Ok(spin.scope)
    }
}

fn next_registry_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> ipnetwork::Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn save_generates_a_bundle_per_cell() {
        let mut registry = Registry::init("home", "alice").unwrap();
        let a = registry.add_cell("a", "alice", Some("203.0.113.1".parse().unwrap()), vec![], false).unwrap();
        let b = registry.add_cell("b", "alice", Some("203.0.113.2".parse().unwrap()), vec![], false).unwrap();
        registry.save().unwrap();

        assert!(!registry.cell_bundle(a).unwrap().is_empty());
        assert!(!registry.cell_bundle(b).unwrap().is_empty());
        assert!(!registry.is_dirty());
    }

    #[test]
    fn overlapping_lans_are_rejected_through_the_registry() {
        let mut registry = Registry::init("home", "alice").unwrap();
        registry.add_cell("a", "alice", None, vec![net("192.168.1.0/24")], false).unwrap();
        let err = registry.add_cell("b", "alice", None, vec![net("192.168.1.128/25")], false).unwrap_err();
        assert!(matches!(err, RegistryError::Membership(_)));
    }

    #[test]
    fn redeploy_forces_backbone_regeneration_with_no_membership_change() {
        let mut registry = Registry::init("home", "alice").unwrap();
        registry.add_cell("a", "alice", Some("203.0.113.1".parse().unwrap()), vec![], false).unwrap();
        registry.add_cell("b", "alice", Some("203.0.113.2".parse().unwrap()), vec![], false).unwrap();
        registry.save().unwrap();
        let gen1 = registry.deployment().unwrap().generation_ts;

        registry.redeploy();
        assert!(registry.is_dirty());
        registry.save().unwrap();
        assert!(registry.deployment().unwrap().generation_ts >= gen1);
    }

    #[test]
    fn particles_vpn_root_is_the_enabling_cell() {
        let mut registry = Registry::init("home", "alice").unwrap();
        registry.configure_settings(|s| s.enable_particles_vpn = true);
        let a = registry.add_cell("a", "alice", Some("203.0.113.1".parse().unwrap()), vec![], true).unwrap();
        registry.add_particle("p1", "alice").unwrap();
        registry.add_particle("p2", "alice").unwrap();
        registry.save().unwrap();

        assert_eq!(registry.particles_vpn_root_cell, Some(a));
        assert_eq!(registry.particle_packages.len(), 2);
    }

    #[test]
    fn ban_then_rekey_cell_produces_a_new_registry_id() {
        let mut registry = Registry::init("home", "alice").unwrap();
        let a = registry.add_cell("a", "alice", None, vec![], false).unwrap();
        registry.save().unwrap();
        let old_id = registry.registry_id().to_string();

        let spin = registry.begin_rekey(RekeyScope::Cell(a), Duration::from_secs(5)).unwrap();
        assert!(!spin.is_complete());
        assert_ne!(registry.registry_id(), old_id);
    }

    #[test]
    fn rekey_spin_completes_once_the_cell_acknowledges_the_new_generation() {
        let mut registry = Registry::init("home", "alice").unwrap();
        let a = registry.add_cell("a", "alice", None, vec![], false).unwrap();
        registry.save().unwrap();

        registry.begin_rekey(RekeyScope::Cell(a), Duration::from_secs(5)).unwrap();
        let new_id = registry.registry_id().to_string();
        let spin = registry.pending_rekey().unwrap();
        assert!(spin.observe(a, &new_id));
        registry.finish_rekey().unwrap();
        assert!(registry.pending_rekey().is_none());
    }
}
