//! Events carried on the in-process notification bus.
//!
//! `uvn-08-peers` publishes one of these per mutation, in the same fixed
//! dispatch order the reference agent uses for its listener callbacks
//! (online cells, then consistency, then reachability, then links).
//! `uvn-10-controlplane` reuses the same bus to wake its waitset loop from
//! background workers (the timer and reachability-probe tasks) without
//! adding a second notification mechanism.

use serde::{Deserialize, Serialize};
use shared_types::ids::{CellId, PeerId};
use shared_types::net::LanDescriptor;
use std::collections::BTreeSet;

/// All events that can be published to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UvnEvent {
    /// The set of cells currently asserting liveliness changed.
    OnlineCells(BTreeSet<CellId>),
    /// Every defined cell is now online.
    AllCellsConnected,
    /// The registry's own presence became reachable, or stopped being so.
    RegistryConnected(bool),
    /// A peer's advertised routed LANs changed.
    RoutedNetworks {
        peer: PeerId,
        networks: Vec<LanDescriptor>,
    },
    /// A routed LAN not previously seen from any peer was discovered.
    RoutedNetworksDiscovered {
        peer: PeerId,
        networks: Vec<LanDescriptor>,
    },
    /// A cell's applied config generation now matches the registry's.
    ConsistentConfigCells(BTreeSet<CellId>),
    /// Every cell's applied config generation matches the registry's.
    ConsistentConfigUvn,
    /// The set of networks this agent can reach by direct probing changed.
    LocalReachableNetworks(Vec<LanDescriptor>),
    /// The UVN-wide reachable-networks view for a peer changed.
    ReachableNetworks {
        peer: PeerId,
        networks: Vec<LanDescriptor>,
    },
    /// Every network routed by any cell is reachable from every other cell.
    FullyRoutedUvn,
    /// A VPN tunnel's link status changed.
    VpnConnections {
        peer: PeerId,
        interface: String,
        online: bool,
    },
    /// Internal wakeup outside the UVN/CELL/BACKBONE dispatch order, used
    /// to break a waitset loop out of `wait()` from a timer or a completed
    /// background task.
    Trigger(String),
}

impl UvnEvent {
    /// Topic used for coarse subscription filtering.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Trigger(_) => EventTopic::ControlPlane,
            _ => EventTopic::Peers,
        }
    }

    /// The peer this event is about, if any.
    #[must_use]
    pub fn peer(&self) -> Option<PeerId> {
        match self {
            Self::RoutedNetworks { peer, .. }
            | Self::RoutedNetworksDiscovered { peer, .. }
            | Self::ReachableNetworks { peer, .. }
            | Self::VpnConnections { peer, .. } => Some(*peer),
            Self::RegistryConnected(_) => Some(PeerId::Registry),
            _ => None,
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Peers-registry notifications (§4.8 listener events).
    Peers,
    /// Control-plane-internal wakeups.
    ControlPlane,
    /// All events, no filtering.
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Peers to include. Empty means all peers.
    pub peers: Vec<PeerId>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            peers: Vec::new(),
        }
    }

    /// Create a filter for events about specific peers.
    #[must_use]
    pub fn from_peers(peers: Vec<PeerId>) -> Self {
        Self {
            topics: Vec::new(),
            peers,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &UvnEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let peer_match = self.peers.is_empty()
            || match event.peer() {
                Some(p) => self.peers.contains(&p),
                None => true,
            };

        topic_match && peer_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_all_matches_everything() {
        let filter = EventFilter::all();
        assert!(filter.matches(&UvnEvent::AllCellsConnected));
        assert!(filter.matches(&UvnEvent::Trigger("probe".into())));
    }

    #[test]
    fn filter_by_topic_excludes_other_topic() {
        let filter = EventFilter::topics(vec![EventTopic::ControlPlane]);
        assert!(!filter.matches(&UvnEvent::AllCellsConnected));
        assert!(filter.matches(&UvnEvent::Trigger("timer".into())));
    }

    #[test]
    fn filter_by_peer_excludes_other_peers() {
        let filter = EventFilter::from_peers(vec![PeerId::Cell(CellId::new(1))]);
        let matching = UvnEvent::VpnConnections {
            peer: PeerId::Cell(CellId::new(1)),
            interface: "uwg-b0".into(),
            online: true,
        };
        let other = UvnEvent::VpnConnections {
            peer: PeerId::Cell(CellId::new(2)),
            interface: "uwg-b0".into(),
            online: true,
        };
        assert!(filter.matches(&matching));
        assert!(!filter.matches(&other));
        // events with no associated peer always pass a peer filter
        assert!(filter.matches(&UvnEvent::FullyRoutedUvn));
    }
}
