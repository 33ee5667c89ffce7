//! # VpnConfig
//!
//! Renders WireGuard tunnel configs for the two VPN shapes a UVN uses
//! (§4.4): **centralized** (one root, N peers — used for the root and
//! particles VPNs) and **peer-to-peer** (a tunnel per backbone edge,
//! derived from a `Deployment`). Produces data only; programming the
//! result into the kernel is `uvn-05-tunnel`'s job.

pub mod errors;
pub mod keymat;
pub mod wg;

pub use errors::VpnConfigError;
pub use keymat::{CentralizedVpnKeyMaterial, P2PVpnKeyMaterial};
pub use wg::WgKeyPair;

use std::net::{Ipv4Addr, SocketAddrV4};

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use shared_types::ids::{CellId, PeerId};
use shared_types::settings::{BackboneVpnSettings, VpnSettings};
use shared_types::uvn::Cell;
use uvn_03_deployment::Deployment;

const NAT_KEEPALIVE_SECS: u16 = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    pub public_key: String,
    pub preshared_key: String,
    pub endpoint: Option<SocketAddrV4>,
    pub allowed_ips: Vec<Ipv4Network>,
    pub persistent_keepalive: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    pub interface_name: String,
    pub private_key: String,
    pub address: Ipv4Network,
    pub listen_port: Option<u16>,
    pub mtu: u32,
    pub peers: Vec<PeerEntry>,
}

fn interface_name(template: &str, index: u32) -> String {
    template.replacen("{}", &index.to_string(), 1)
}

fn host_network(addr: Ipv4Addr, prefix: u8) -> Ipv4Network {
    Ipv4Network::new(addr, prefix).expect("prefix from a validated VpnSettings subnet")
}

/// Builds the root's config plus every peer's config for a centralized
/// profile (root or particles VPN). `peers` is `(id, public_address)` for
/// every cell/particle the registry has declared for this profile.
#[tracing::instrument(skip_all, fields(peers = peers.len()))]
pub fn centralized_configs(
    settings: &VpnSettings,
    root_public_address: Option<Ipv4Addr>,
    peers: &[(PeerId, Option<Ipv4Addr>)],
    keymat: &mut CentralizedVpnKeyMaterial,
) -> Result<(TunnelConfig, Vec<(PeerId, TunnelConfig)>), VpnConfigError> {
    if peers.is_empty() {
        return Err(VpnConfigError::NoPeers);
    }
    keymat.assert_keys(peers.iter().map(|(id, _)| *id));

    let prefix = settings.subnet.prefix();
    let base = settings.base_ip();
    let root_ip = Ipv4Addr::from(u32::from(base) + 1);

    let mut ordered: Vec<&(PeerId, Option<Ipv4Addr>)> = peers.iter().collect();
    ordered.sort_by_key(|(id, _)| *id);

    let mut root_peers = Vec::with_capacity(ordered.len());
    let mut peer_configs = Vec::with_capacity(ordered.len());

    for (i, (id, public_address)) in ordered.iter().enumerate() {
        let peer_ip = Ipv4Addr::from(u32::from(base) + 2 + i as u32);
        let (peer_key, psk) = keymat.peer_material(*id)?;

        root_peers.push(PeerEntry {
            public_key: peer_key.public_key.clone(),
            preshared_key: psk.clone(),
            endpoint: None,
            allowed_ips: vec![host_network(peer_ip, 32)],
            persistent_keepalive: None,
        });

        let allowed_ips = if settings.allowed_ips.is_empty() {
            vec![host_network(root_ip, 32)]
        } else {
            settings.allowed_ips.clone()
        };
        let endpoint = root_public_address.map(|ip| SocketAddrV4::new(ip, settings.port));
        let keepalive = if public_address.is_none() { Some(NAT_KEEPALIVE_SECS) } else { None };

        peer_configs.push((
            *id,
            TunnelConfig {
                interface_name: interface_name(&settings.interface_name_template, 0),
                private_key: peer_key.private_key().to_string(),
                address: host_network(peer_ip, prefix),
                listen_port: settings.peer_port,
                mtu: settings.peer_mtu,
                peers: vec![PeerEntry {
                    public_key: keymat.root_key()?.public_key.clone(),
                    preshared_key: psk,
                    endpoint,
                    allowed_ips,
                    persistent_keepalive: keepalive,
                }],
            },
        ));
    }

    let root_config = TunnelConfig {
        interface_name: interface_name(&settings.interface_name_template, 0),
        private_key: keymat.root_key()?.private_key().to_string(),
        address: host_network(root_ip, prefix),
        listen_port: Some(settings.port),
        mtu: settings.peer_mtu,
        peers: root_peers,
    };

    tracing::info!(peer_count = peer_configs.len(), "centralized vpn config generated");
    Ok((root_config, peer_configs))
}

/// Builds every cell's list of backbone tunnel configs (one per edge it
/// participates in) from a computed `Deployment`.
#[tracing::instrument(skip_all, fields(cells = cells.len()))]
pub fn peer_to_peer_configs(
    deployment: &Deployment,
    backbone: &BackboneVpnSettings,
    cells: &[Cell],
    keymat: &mut P2PVpnKeyMaterial,
) -> std::collections::BTreeMap<CellId, Vec<TunnelConfig>> {
    let by_id: std::collections::BTreeMap<CellId, &Cell> = cells.iter().map(|c| (c.id, c)).collect();
    let prefix = 31u8;
    let mut out = std::collections::BTreeMap::new();

    for (cell_id, slot) in &deployment.peers {
        let Some(cell) = by_id.get(cell_id) else { continue };
        let mut configs = Vec::with_capacity(slot.peers.len());

        for (peer_id, link) in &slot.peers {
            let Some(peer_cell) = by_id.get(peer_id) else { continue };
            let (side_self, side_peer, psk) = keymat.assert_pair(*cell_id, *peer_id);

            let mut allowed_ips = vec![backbone.vpn.subnet];
            allowed_ips.extend(peer_cell.allowed_lans.iter().copied());

            let peer_port_index = deployment
                .peers
                .get(peer_id)
                .and_then(|s| s.peers.get(cell_id))
                .map(|l| l.port_index)
                .unwrap_or(0);
            let endpoint = peer_cell
                .public_address
                .map(|ip| SocketAddrV4::new(ip, backbone.vpn.port + peer_port_index as u16));
            let keepalive = if endpoint.is_none() { Some(NAT_KEEPALIVE_SECS) } else { None };

            configs.push(TunnelConfig {
                interface_name: interface_name(&backbone.vpn.interface_name_template, link.port_index),
                private_key: side_self.private_key().to_string(),
                address: link.link_subnet,
                listen_port: if cell.is_private() {
                    None
                } else {
                    Some(backbone.vpn.port + link.port_index as u16)
                },
                mtu: backbone.vpn.peer_mtu,
                peers: vec![PeerEntry {
                    public_key: side_peer.public_key.clone(),
                    preshared_key: psk,
                    endpoint,
                    allowed_ips,
                    persistent_keepalive: keepalive,
                }],
            });
        }
        configs.sort_by_key(|c| c.listen_port);
        out.insert(*cell_id, configs);
    }

    out
}
