//! # Deployment
//!
//! Computes the backbone graph (§4.2): given the UVN's cells split into
//! public/private and a strategy, builds an edge list, carves a `/31`
//! link subnet per edge from the backbone pool, and assigns each cell's
//! per-peer port via a monotonic `port_index` counter. Pure function of
//! its inputs plus the allocator's cursor order — no I/O, no clock use
//! beyond stamping `generation_ts`.

pub mod allocator;
pub mod errors;
pub mod graph;

pub use errors::DeploymentError;

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use shared_types::ids::CellId;
use shared_types::settings::{BackboneVpnSettings, DeploymentStrategyKind};
use shared_types::uvn::Cell;

use allocator::LinkSubnetAllocator;
use graph::Edge;

/// One cell's record of a single backbone peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub port_index: u32,
    pub local_addr: Ipv4Addr,
    pub remote_addr: Ipv4Addr,
    pub link_subnet: Ipv4Network,
}

/// A single cell's position in the deployment: its stable UI ordinal and
/// its peer table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerSlot {
    pub n: u32,
    pub peers: BTreeMap<CellId, LinkEndpoint>,
}

/// A complete backbone assignment, computed at `generation_ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub generation_ts: DateTime<Utc>,
    pub peers: BTreeMap<CellId, PeerSlot>,
}

impl Deployment {
    /// Computes a deployment for `cells` under the strategy and args
    /// carried in `backbone`. Cells are consulted only for id and
    /// `is_private()`; membership/banning is the caller's concern.
    #[tracing::instrument(skip_all, fields(strategy = ?backbone.deployment_strategy, cells = cells.len()))]
    pub fn compute(
        cells: &[Cell],
        backbone: &BackboneVpnSettings,
        generation_ts: DateTime<Utc>,
    ) -> Result<Self, DeploymentError> {
        let mut public: Vec<CellId> = cells.iter().filter(|c| !c.is_private()).map(|c| c.id).collect();
        let mut private: Vec<CellId> = cells.iter().filter(|c| c.is_private()).map(|c| c.id).collect();
        public.sort();
        private.sort();
        let all_cells: BTreeSet<CellId> = cells.iter().map(|c| c.id).collect();

        let edges: BTreeSet<Edge> = match backbone.deployment_strategy {
            DeploymentStrategyKind::FullMesh => graph::full_mesh(&public, &private),
            DeploymentStrategyKind::Circular => graph::circular(&public, &private),
            DeploymentStrategyKind::Crossed => graph::crossed(&public, &private),
            DeploymentStrategyKind::Random => graph::random(&public, &private, &backbone.deployment_strategy_args)?,
            DeploymentStrategyKind::Static => {
                graph::static_edges(&all_cells, &backbone.deployment_strategy_args)?
            }
        };

        validate_private_only_peers_public(&edges, &private)?;
        if cells.len() > 1 {
            validate_connected(&edges)?;
        }

        let deployment = assign(&all_cells, &edges, backbone, generation_ts)?;
        tracing::info!(edges = edges.len(), "deployment computed");
        Ok(deployment)
    }
}

fn validate_private_only_peers_public(edges: &BTreeSet<Edge>, private: &[CellId]) -> Result<(), DeploymentError> {
    let private_set: BTreeSet<CellId> = private.iter().copied().collect();
    for (a, b) in edges {
        if private_set.contains(a) && private_set.contains(b) {
            return Err(DeploymentError::PrivateCellUnreachable(*a));
        }
    }
    Ok(())
}

/// Connectivity is checked only over cells that actually carry at least
/// one edge: a strategy may legitimately leave some cells edgeless (the
/// full-mesh strategy's private cells dangle by design, §4.2), and those
/// are not required to join the single component.
fn validate_connected(edges: &BTreeSet<Edge>) -> Result<(), DeploymentError> {
    let mut adjacency: BTreeMap<CellId, Vec<CellId>> = BTreeMap::new();
    for (a, b) in edges {
        adjacency.entry(*a).or_default().push(*b);
        adjacency.entry(*b).or_default().push(*a);
    }
    if adjacency.is_empty() {
        return Ok(());
    }
    let start = *adjacency.keys().next().unwrap();
    let mut seen = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(neighbors) = adjacency.get(&node) {
            stack.extend(neighbors.iter().copied());
        }
    }
    if seen.len() == adjacency.len() {
        Ok(())
    } else {
        Err(DeploymentError::Disconnected)
    }
}

fn assign(
    all_cells: &BTreeSet<CellId>,
    edges: &BTreeSet<Edge>,
    backbone: &BackboneVpnSettings,
    generation_ts: DateTime<Utc>,
) -> Result<Deployment, DeploymentError> {
    let mut allocator = LinkSubnetAllocator::new(backbone.vpn.subnet);
    let mut per_cell_peers: BTreeMap<CellId, Vec<(CellId, Ipv4Network, Ipv4Addr, Ipv4Addr)>> = BTreeMap::new();

    for (a, b) in edges {
        let (subnet, addr_lo, addr_hi) = allocator.next()?;
        per_cell_peers.entry(*a).or_default().push((*b, subnet, addr_lo, addr_hi));
        per_cell_peers.entry(*b).or_default().push((*a, subnet, addr_hi, addr_lo));
    }

    let mut peers = BTreeMap::new();
    for (n, cell) in all_cells.iter().enumerate() {
        let mut slot = PeerSlot {
            n: n as u32,
            peers: BTreeMap::new(),
        };
        if let Some(entries) = per_cell_peers.get(cell) {
            let mut entries = entries.clone();
            entries.sort_by_key(|(peer, ..)| *peer);
            for (port_index, (peer, subnet, local_addr, remote_addr)) in entries.into_iter().enumerate() {
                slot.peers.insert(
                    peer,
                    LinkEndpoint {
                        port_index: port_index as u32,
                        local_addr,
                        remote_addr,
                        link_subnet: subnet,
                    },
                );
            }
        }
        peers.insert(*cell, slot);
    }

    Ok(Deployment { generation_ts, peers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::settings::{BackboneVpnSettings, DeploymentStrategyKind, StrategyArgs};
    use std::net::Ipv4Addr;

    fn backbone(strategy: DeploymentStrategyKind, args: StrategyArgs) -> BackboneVpnSettings {
        BackboneVpnSettings {
            vpn: shared_types::settings::UvnSettings::default().backbone_vpn.vpn,
            deployment_strategy: strategy,
            deployment_strategy_args: args,
        }
    }

    fn cell(id: u32, public: bool) -> Cell {
        Cell {
            id: CellId::new(id),
            name: format!("cell{id}"),
            owner: "owner".to_string(),
            public_address: if public { Some(Ipv4Addr::new(203, 0, 113, id as u8)) } else { None },
            allowed_lans: Vec::new(),
            enable_particles_vpn: false,
        }
    }

    #[test]
    fn full_mesh_connects_every_public_pair_and_strands_privates() {
        let cells = vec![cell(1, true), cell(2, true), cell(3, true), cell(4, false)];
        let bb = backbone(DeploymentStrategyKind::FullMesh, StrategyArgs::new());
        let d = Deployment::compute(&cells, &bb, Utc::now()).unwrap();
        assert_eq!(d.peers[&CellId::new(1)].peers.len(), 2);
        assert_eq!(d.peers[&CellId::new(4)].peers.len(), 0);
    }

    #[test]
    fn every_edge_agrees_on_the_same_link_subnet_with_addresses_swapped() {
        let cells = vec![cell(1, true), cell(2, true), cell(3, true)];
        let bb = backbone(DeploymentStrategyKind::Circular, StrategyArgs::new());
        let d = Deployment::compute(&cells, &bb, Utc::now()).unwrap();
        let a_side = &d.peers[&CellId::new(1)].peers[&CellId::new(2)];
        let b_side = &d.peers[&CellId::new(2)].peers[&CellId::new(1)];
        assert_eq!(a_side.link_subnet, b_side.link_subnet);
        assert_eq!(a_side.local_addr, b_side.remote_addr);
        assert_eq!(a_side.remote_addr, b_side.local_addr);
    }

    #[test]
    fn private_cell_peers_only_with_a_public_cell() {
        let cells = vec![cell(1, true), cell(2, true), cell(3, false)];
        let bb = backbone(DeploymentStrategyKind::Circular, StrategyArgs::new());
        let d = Deployment::compute(&cells, &bb, Utc::now()).unwrap();
        let private_peers: Vec<CellId> = d.peers[&CellId::new(3)].peers.keys().copied().collect();
        assert_eq!(private_peers, vec![CellId::new(1)]);
    }

    #[test]
    fn deployment_with_only_private_cells_is_rejected() {
        let cells = vec![cell(1, false), cell(2, false)];
        let bb = backbone(DeploymentStrategyKind::Circular, StrategyArgs::new());
        assert!(Deployment::compute(&cells, &bb, Utc::now()).is_err());
    }

    #[test]
    fn static_strategy_uses_the_supplied_edges() {
        let cells = vec![cell(1, true), cell(2, true), cell(3, true)];
        let mut args = StrategyArgs::new();
        args.insert("edges".to_string(), serde_json::json!([[1, 2], [2, 3]]));
        let bb = backbone(DeploymentStrategyKind::Static, args);
        let d = Deployment::compute(&cells, &bb, Utc::now()).unwrap();
        assert_eq!(d.peers[&CellId::new(1)].peers.len(), 1);
        assert_eq!(d.peers[&CellId::new(2)].peers.len(), 2);
    }

    #[test]
    fn same_strategy_and_cell_set_is_deterministic() {
        let cells = vec![cell(1, true), cell(2, true), cell(3, true), cell(4, true)];
        let bb = backbone(DeploymentStrategyKind::Crossed, StrategyArgs::new());
        let ts = Utc::now();
        let d1 = Deployment::compute(&cells, &bb, ts).unwrap();
        let d2 = Deployment::compute(&cells, &bb, ts).unwrap();
        assert_eq!(serde_json::to_string(&d1.peers).unwrap(), serde_json::to_string(&d2.peers).unwrap());
    }
}
