//! The agent's local status dashboard is an external collaborator (§9,
//! same design note as the DDS transport and the template renderer): a
//! real implementation would serve an HTTPS status page, but that surface
//! is out of scope here. [`DashboardSink`] is the seam a concrete one
//! would plug into; [`NoopDashboard`] satisfies it for every agent built
//! in this workspace today.

use shared_types::ids::PeerId;
use shared_types::uvn::{PeerRecord, PeerStatus};

/// A point-in-time view of the local agent's own status, published once
/// per peers-registry update for a dashboard to render.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub local: PeerId,
    pub status: PeerStatus,
    pub online_peers: usize,
    pub total_peers: usize,
}

impl DashboardSnapshot {
    pub fn from_local(local: &PeerRecord, total_peers: usize, online_peers: usize) -> Self {
        Self {
            local: local.id,
            status: local.status,
            online_peers,
            total_peers,
        }
    }
}

pub trait DashboardSink: Send + Sync {
    fn publish(&self, snapshot: &DashboardSnapshot);
}

/// Discards every snapshot. The default sink until a real dashboard
/// collaborator is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDashboard;

impl DashboardSink for NoopDashboard {
    fn publish(&self, _snapshot: &DashboardSnapshot) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_dashboard_accepts_any_snapshot() {
        let sink = NoopDashboard;
        let local = PeerRecord::declared(PeerId::Registry, shared_types::uvn::PeerKind::Registry);
        sink.publish(&DashboardSnapshot::from_local(&local, 1, 0));
    }
}
