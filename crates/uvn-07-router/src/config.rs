//! Renders an OSPF routing-daemon configuration (§4.7), grounded on the
//! reference `uno/agent/router.py` FRR template: one `router ospf` block
//! with a fixed router-id, an `interface` stanza per backbone tunnel
//! carrying the timing-profile-derived hello/dead/retransmit intervals,
//! and `network ... area 0` statements for every local LAN the cell
//! routes. Produces text only — applying it is [`crate::driver`]'s job.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use shared_types::timing::TimingProfile;

/// One backbone tunnel interface OSPF should run over.
#[derive(Debug, Clone)]
pub struct RouterInterface {
    pub name: String,
    pub cost: Option<u16>,
}

/// Everything needed to render a complete daemon config for one cell.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub router_id: Ipv4Addr,
    pub area: Ipv4Addr,
    pub interfaces: Vec<RouterInterface>,
    pub local_lans: Vec<Ipv4Network>,
    pub timing_profile: TimingProfile,
}

impl RouterConfig {
    /// Renders FRR-style `ospfd.conf` text.
    pub fn render(&self) -> String {
        let hello = self.timing_profile.ospf_hello_interval().as_secs();
        let dead = self.timing_profile.ospf_dead_interval().as_secs();
        let retransmit = self.timing_profile.ospf_retransmit_interval().as_secs();

        let mut out = String::new();
        out.push_str("! generated, do not edit by hand\n");
        out.push_str("hostname uvn-router\n");
        out.push_str("log syslog informational\n");
        out.push('\n');

        for iface in &self.interfaces {
            out.push_str(&format!("interface {}\n", iface.name));
            out.push_str(&format!(" ip ospf hello-interval {hello}\n"));
            out.push_str(&format!(" ip ospf dead-interval {dead}\n"));
            out.push_str(&format!(" ip ospf retransmit-interval {retransmit}\n"));
            if let Some(cost) = iface.cost {
                out.push_str(&format!(" ip ospf cost {cost}\n"));
            }
            out.push_str("!\n");
        }

        out.push_str(&format!("router ospf\n ospf router-id {}\n", self.router_id));
        for iface in &self.interfaces {
            out.push_str(&format!(" network {}/32 area {}\n", self.router_id, self.area));
            let _ = iface;
        }
        for lan in &self.local_lans {
            out.push_str(&format!(" network {} area {}\n", lan, self.area));
        }
        out.push_str(" passive-interface default\n");
        for iface in &self.interfaces {
            out.push_str(&format!(" no passive-interface {}\n", iface.name));
        }
        out.push_str("!\n");
        out
    }
}
