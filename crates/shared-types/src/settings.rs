//! UVN-wide and per-profile VPN settings.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::timing::TimingProfile;

/// Shared fields of every VPN profile (root, particles, backbone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnSettings {
    pub port: u16,
    pub peer_port: Option<u16>,
    pub subnet: Ipv4Network,
    pub interface_name_template: String,
    pub allowed_ips: Vec<Ipv4Network>,
    pub peer_mtu: u32,
    pub masquerade: bool,
    pub forward: bool,
    pub tunnel: bool,
}

impl VpnSettings {
    pub fn base_ip(&self) -> std::net::Ipv4Addr {
        self.subnet.network()
    }
}

fn default_root_settings() -> VpnSettings {
    VpnSettings {
        port: 63447,
        peer_port: None,
        subnet: "192.168.254.0/24".parse().unwrap(),
        interface_name_template: "uwg-v{}".to_string(),
        allowed_ips: Vec::new(),
        peer_mtu: 1320,
        masquerade: false,
        forward: false,
        tunnel: true,
    }
}

fn default_particles_settings() -> VpnSettings {
    VpnSettings {
        port: 63448,
        peer_port: None,
        subnet: "192.168.253.0/24".parse().unwrap(),
        interface_name_template: "uwg-p{}".to_string(),
        allowed_ips: Vec::new(),
        peer_mtu: 1320,
        masquerade: true,
        forward: true,
        tunnel: true,
    }
}

fn default_backbone_settings() -> VpnSettings {
    VpnSettings {
        port: 63449,
        peer_port: Some(63449),
        subnet: "10.255.192.0/20".parse().unwrap(),
        interface_name_template: "uwg-b{}".to_string(),
        allowed_ips: Vec::new(),
        peer_mtu: 1320,
        masquerade: false,
        forward: true,
        tunnel: true,
    }
}

/// Backbone-graph shape. `Static` supplies its edge list verbatim via
/// `strategy_args`; the rest compute the graph from cell count and degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStrategyKind {
    Crossed,
    Circular,
    Random,
    Static,
    FullMesh,
}

/// Free-form strategy parameters: a PRNG seed for `random`, an explicit
/// `{cell_id: [cell_id, ...]}` edge list for `static`, or a target degree.
pub type StrategyArgs = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackboneVpnSettings {
    #[serde(flatten)]
    pub vpn: VpnSettings,
    pub deployment_strategy: DeploymentStrategyKind,
    pub deployment_strategy_args: StrategyArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvnSettings {
    pub root_vpn: VpnSettings,
    pub particles_vpn: VpnSettings,
    pub backbone_vpn: BackboneVpnSettings,
    pub timing_profile: TimingProfile,
    pub enable_root_vpn: bool,
    pub enable_particles_vpn: bool,
    pub dds_domain: u16,
    pub enable_dds_security: bool,
}

impl Default for UvnSettings {
    fn default() -> Self {
        Self {
            root_vpn: default_root_settings(),
            particles_vpn: default_particles_settings(),
            backbone_vpn: BackboneVpnSettings {
                vpn: default_backbone_settings(),
                deployment_strategy: DeploymentStrategyKind::Crossed,
                deployment_strategy_args: StrategyArgs::new(),
            },
            timing_profile: TimingProfile::Default,
            enable_root_vpn: true,
            enable_particles_vpn: true,
            dds_domain: 63,
            enable_dds_security: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_give_non_overlapping_profile_subnets() {
        let s = UvnSettings::default();
        assert_ne!(s.root_vpn.subnet, s.particles_vpn.subnet);
        assert_ne!(s.root_vpn.subnet, s.backbone_vpn.vpn.subnet);
    }
}
