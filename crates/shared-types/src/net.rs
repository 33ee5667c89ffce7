//! Network descriptors and IPv4 helpers.
//!
//! `NicDescriptor`/`LanDescriptor` give the concrete shape of a detected
//! local network interface and its attached LAN, beyond the abstract
//! `allowed_lans: set<IPv4Net>` of the data model.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NicDescriptor {
    pub name: String,
    pub address: Option<Ipv4Addr>,
    pub subnet: Option<Ipv4Network>,
}

impl NicDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            subnet: None,
        }
    }
}

/// A LAN attached to a cell through a local NIC, with the gateway address
/// used to reach it and (once discovered by the probe) the next hop used
/// to reach that gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanDescriptor {
    pub nic: NicDescriptor,
    pub gateway: Ipv4Addr,
    pub next_hop: Option<Ipv4Addr>,
}

impl LanDescriptor {
    pub fn subnet(&self) -> Option<Ipv4Network> {
        self.nic.subnet
    }
}

impl std::hash::Hash for LanDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.nic.name.hash(state);
        self.gateway.hash(state);
    }
}

/// Masks `addr` to its network address given a CIDR prefix length,
/// mirroring `ipv4_nic_network` from the reference implementation.
pub fn ipv4_nic_network(addr: Ipv4Addr, prefix: u8) -> Ipv4Network {
    let net = Ipv4Network::new(addr, prefix).expect("prefix 0..=32");
    Ipv4Network::new(net.network(), prefix).expect("prefix 0..=32")
}

/// True if `a` and `b` fall in the same subnet under `prefix`.
pub fn is_same_subnet(a: Ipv4Addr, b: Ipv4Addr, prefix: u8) -> bool {
    ipv4_nic_network(a, prefix) == ipv4_nic_network(b, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nic_network_masks_to_network_address() {
        let net = ipv4_nic_network(Ipv4Addr::new(192, 168, 1, 37), 24);
        assert_eq!(net.network(), Ipv4Addr::new(192, 168, 1, 0));
    }

    #[test]
    fn same_subnet_detection() {
        assert!(is_same_subnet(
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(10, 0, 0, 200),
            24
        ));
        assert!(!is_same_subnet(
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(10, 0, 1, 200),
            24
        ));
    }
}
