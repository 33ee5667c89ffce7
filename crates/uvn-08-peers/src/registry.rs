//! Peer registry and the higher-level event notifications derived from it
//! (§4.8), grounded on the reference `UvnPeersList`/`UvnPeerListener`: a
//! flat collection of [`PeerRecord`]s, a per-update dirty set, and a fixed
//! dispatch order for the events a status change can trigger. Events only
//! fire while the local peer itself is online — a disconnected agent has
//! nothing meaningful to report.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use ipnetwork::Ipv4Network;
use shared_bus::{EventPublisher, UvnEvent};
use shared_types::ids::{CellId, PeerId};
use shared_types::net::LanDescriptor;
use shared_types::uvn::{PeerKind, PeerRecord, PeerStatus, Uvn};

use crate::errors::PeersError;

#[derive(Debug, Default)]
struct Toggles {
    all_cells_connected: bool,
    registry_connected: bool,
    routed_networks_discovered: bool,
    consistent_config_uvn: bool,
    fully_routed_uvn: bool,
}

/// Holds one [`PeerRecord`] per UVN member plus the registry peer itself,
/// and turns raw field mutations into the ordered listener events of
/// §4.8 when [`PeerRegistry::process_updates`] is called.
pub struct PeerRegistry {
    local: PeerId,
    expected_cells: BTreeSet<CellId>,
    expected_networks: HashSet<Ipv4Network>,
    peers: BTreeMap<PeerId, PeerRecord>,
    dirty: BTreeSet<PeerId>,
    toggles: Toggles,
}

impl PeerRegistry {
    /// Builds a registry of `Declared` peers for the registry itself and
    /// every cell/particle in `uvn`. The union of every cell's
    /// `allowed_lans` is retained as the expected network set, used to
    /// recognize when discovery is complete (`routed_networks_discovered`)
    /// and when routing is complete (`fully_routed_uvn`).
    pub fn from_uvn(uvn: &Uvn, local: PeerId) -> Self {
        let cells: Vec<(CellId, HashSet<Ipv4Network>)> = uvn
            .cells()
            .map(|c| (c.id, c.allowed_lans.iter().copied().collect()))
            .collect();
        let particles: Vec<PeerId> = uvn.particles().map(|p| PeerId::Particle(p.id)).collect();
        Self::new(local, cells, particles)
    }

    /// Builds a registry directly from the cell ids and per-cell LAN sets
    /// an agent already knows (its own `AgentConfig.backbone_slot` and the
    /// LANs it has seen advertised) rather than a full [`Uvn`] — the one
    /// construction path an agent can actually use, since it never holds
    /// UVN membership (§3 Ownership). `from_uvn` is a convenience wrapper
    /// over this for the registry, which does hold one.
    pub fn new(
        local: PeerId,
        cells: impl IntoIterator<Item = (CellId, HashSet<Ipv4Network>)>,
        particles: impl IntoIterator<Item = PeerId>,
    ) -> Self {
        let mut peers = BTreeMap::new();
        peers.insert(PeerId::Registry, PeerRecord::declared(PeerId::Registry, PeerKind::Registry));
        let mut expected_cells = BTreeSet::new();
        let mut expected_networks = HashSet::new();
        for (id, lans) in cells {
            expected_cells.insert(id);
            expected_networks.extend(lans);
            peers.insert(PeerId::Cell(id), PeerRecord::declared(PeerId::Cell(id), PeerKind::Cell));
        }
        for particle in particles {
            peers.insert(particle, PeerRecord::declared(particle, PeerKind::Particle));
        }
        Self {
            local,
            expected_cells,
            expected_networks,
            peers,
            dirty: BTreeSet::new(),
            toggles: Toggles::default(),
        }
    }

    /// Registers a peer not known at construction time (an agent learns of
    /// new cells as `CELL` samples arrive, rather than up front). A no-op
    /// if `id` is already known.
    pub fn learn_peer(&mut self, id: PeerId, kind: PeerKind) {
        if let PeerId::Cell(cell_id) = id {
            self.expected_cells.insert(cell_id);
        }
        self.peers.entry(id).or_insert_with(|| PeerRecord::declared(id, kind));
    }

    pub fn peer(&self, id: PeerId) -> Option<&PeerRecord> {
        self.peers.get(&id)
    }

    pub fn local(&self) -> Option<&PeerRecord> {
        self.peers.get(&self.local)
    }

    /// Total known peers (registry, plus every learned cell/particle).
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Known peers currently reporting `Online`.
    pub fn online_peer_count(&self) -> usize {
        self.peers.values().filter(|p| p.status == PeerStatus::Online).count()
    }

    fn local_online(&self) -> bool {
        matches!(self.local(), Some(p) if p.status == PeerStatus::Online)
    }

    /// Applies `f` to the record for `id` and marks it dirty if anything
    /// actually changed. Returns whether the record changed.
    pub fn update_peer(&mut self, id: PeerId, f: impl FnOnce(&mut PeerRecord)) -> Result<bool, PeersError> {
        let record = self.peers.get_mut(&id).ok_or(PeersError::UnknownPeer(id))?;
        let before = record.clone();
        f(record);
        let changed = !records_equal(&before, record);
        if changed {
            self.dirty.insert(id);
            tracing::debug!(peer = %id, "peer record updated");
        }
        Ok(changed)
    }

    fn online_cell_ids(&self) -> BTreeSet<CellId> {
        self.peers
            .values()
            .filter_map(|p| match (p.kind.clone(), p.status) {
                (PeerKind::Cell, PeerStatus::Online) => match p.id {
                    PeerId::Cell(id) => Some(id),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    fn consistent_cell_ids(&self, local_registry_id: Option<&str>) -> BTreeSet<CellId> {
        self.peers
            .values()
            .filter_map(|p| match p.id {
                PeerId::Cell(id) if p.registry_id.as_deref() == local_registry_id => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Iterates every known peer other than the local one — the set an
    /// agent probes reachability against and folds into its own `CELL`
    /// sample's view of the mesh.
    pub fn remote_peers(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values().filter(move |p| p.id != self.local)
    }

    fn discovered_networks(&self) -> HashSet<Ipv4Network> {
        self.peers
            .values()
            .filter(|p| p.id != self.local)
            .flat_map(|p| p.routed_networks.iter())
            .filter_map(LanDescriptor::subnet)
            .collect()
    }

    fn remote_reachable_networks(&self) -> HashSet<Ipv4Network> {
        self.peers
            .values()
            .filter(|p| p.id != self.local)
            .flat_map(|p| p.reachable_networks.iter())
            .filter_map(LanDescriptor::subnet)
            .collect()
    }

    /// Collects every dirty peer's diff and publishes the derived events
    /// in the fixed order of §4.8. Clears the dirty set on return. No-op
    /// (dirty set still cleared) if the local peer is not online.
    #[tracing::instrument(skip_all)]
    pub async fn process_updates(&mut self, publisher: &dyn EventPublisher, local_registry_id: Option<&str>) {
        let dirty: Vec<PeerId> = self.dirty.drain().collect();
        if dirty.is_empty() || !self.local_online() {
            return;
        }

        // 1. online_cells
        let online_cells = self.online_cell_ids();
        if dirty.iter().any(|id| matches!(id, PeerId::Cell(_))) {
            publisher.publish(UvnEvent::OnlineCells(online_cells.clone())).await;

            // 2. all_cells_connected
            let all_connected = !self.expected_cells.is_empty() && online_cells == self.expected_cells;
            if all_connected && !self.toggles.all_cells_connected {
                publisher.publish(UvnEvent::AllCellsConnected).await;
            }
            self.toggles.all_cells_connected = all_connected;
        }

        // 3. registry_connected
        if dirty.contains(&PeerId::Registry) {
            let connected = matches!(self.peers.get(&PeerId::Registry), Some(p) if p.status == PeerStatus::Online);
            if connected != self.toggles.registry_connected {
                publisher.publish(UvnEvent::RegistryConnected(connected)).await;
            }
            self.toggles.registry_connected = connected;
        }

        // 4 & 5. routed_networks / routed_networks_discovered
        for &id in &dirty {
            if id == self.local {
                continue;
            }
            if let Some(peer) = self.peers.get(&id) {
                publisher
                    .publish(UvnEvent::RoutedNetworks {
                        peer: id,
                        networks: peer.routed_networks.clone(),
                    })
                    .await;
            }
        }
        if !self.expected_networks.is_empty() {
            let discovered_subnets = self.discovered_networks();
            let complete = self.expected_networks.is_subset(&discovered_subnets);
            if complete && !self.toggles.routed_networks_discovered {
                let networks: Vec<LanDescriptor> = self
                    .peers
                    .values()
                    .filter(|p| p.id != self.local)
                    .flat_map(|p| p.routed_networks.iter().cloned())
                    .collect();
                publisher
                    .publish(UvnEvent::RoutedNetworksDiscovered {
                        peer: self.local,
                        networks,
                    })
                    .await;
            }
            self.toggles.routed_networks_discovered = complete;
        }

        // 6 & 7. consistent_config_cells / consistent_config_uvn
        if dirty.iter().any(|id| matches!(id, PeerId::Cell(_))) {
            let consistent = self.consistent_cell_ids(local_registry_id);
            publisher.publish(UvnEvent::ConsistentConfigCells(consistent.clone())).await;
            let all_consistent = !self.expected_cells.is_empty() && consistent == self.expected_cells;
            if all_consistent && !self.toggles.consistent_config_uvn {
                publisher.publish(UvnEvent::ConsistentConfigUvn).await;
            }
            self.toggles.consistent_config_uvn = all_consistent;
        }

        // 8. local_reachable_networks
        if dirty.contains(&self.local) {
            if let Some(local) = self.peers.get(&self.local) {
                publisher
                    .publish(UvnEvent::LocalReachableNetworks(local.reachable_networks.clone()))
                    .await;
            }
        }

        // 9. reachable_networks
        for &id in &dirty {
            if id == self.local {
                continue;
            }
            if let Some(peer) = self.peers.get(&id) {
                publisher
                    .publish(UvnEvent::ReachableNetworks {
                        peer: id,
                        networks: peer.reachable_networks.clone(),
                    })
                    .await;
            }
        }

        // 10. fully_routed_uvn
        {
            let expected = &self.expected_networks;
            let reachable = self.remote_reachable_networks();
            let fully_routed = !expected.is_empty() && expected.is_subset(&reachable);
            if fully_routed && !self.toggles.fully_routed_uvn {
                publisher.publish(UvnEvent::FullyRoutedUvn).await;
            }
            self.toggles.fully_routed_uvn = fully_routed;
        }

        // 11. vpn_connections
        for &id in &dirty {
            if let Some(peer) = self.peers.get(&id) {
                for (interface, link) in &peer.vpn_link_status {
                    publisher
                        .publish(UvnEvent::VpnConnections {
                            peer: id,
                            interface: interface.clone(),
                            online: link.online,
                        })
                        .await;
                }
            }
        }
    }
}

fn records_equal(a: &PeerRecord, b: &PeerRecord) -> bool {
    a.status == b.status
        && a.registry_id == b.registry_id
        && a.routed_networks == b.routed_networks
        && a.reachable_networks == b.reachable_networks
        && a.unreachable_networks == b.unreachable_networks
        && a.vpn_link_status == b.vpn_link_status
        && a.start_ts == b.start_ts
}
