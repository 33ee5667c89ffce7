//! The `{participant, writers, readers, waitset, conditions}` capability
//! interface of §4.10, expressed per the design note on replacing a
//! runtime-resolved transport plugin with a trait chosen at construction.
//! [`crate::inmem::InMemoryControlPlane`] is the only concrete
//! implementation carried by this workspace; a DDS-backed participant is
//! an external collaborator, same as the template renderer and bundle
//! store (§9 "keep as an external collaborator").

use std::time::Duration;

use shared_types::ids::PeerId;

use crate::topics::{BackboneSample, CellSample, UvnSample};

/// One topic's observation since the last drain: either a valid sample
/// from `peer`, or `peer`'s instance being disposed (guarantee (i)/(ii) of
/// §4.10 — readers must surface these separately, and a disposal must
/// transition the peer to offline).
#[derive(Debug, Clone, PartialEq)]
pub enum TopicEvent<T> {
    Sample { peer: PeerId, sample: T },
    Disposed { peer: PeerId },
}

/// An opaque handle to a registered user (guard) condition: lets internal
/// modules — the reachability probe, the route observer, a timer — wake
/// the waitset without publishing a sample, per §4.10 guarantee (iv).
pub trait UserCondition: Send + Sync {
    /// Signals the condition, waking any blocked `wait`.
    fn trigger(&self);
    /// True if the condition has been triggered since the last `clear`.
    fn is_triggered(&self) -> bool;
    /// Resets the triggered flag.
    fn clear(&self);
}

/// The transport-agnostic control-plane contract: a `Participant` that can
/// create writers/readers for the three fixed topics, block on a waitset,
/// and register user conditions.
pub trait ControlPlaneTransport: Send + Sync {
    fn publish_uvn(&self, sample: UvnSample);
    fn publish_cell(&self, sample: CellSample);
    fn publish_backbone(&self, sample: BackboneSample);

    /// Disposes the registry's `UVN` instance, observed by readers as a
    /// `TopicEvent::Disposed`. Writer/reader status changes like this
    /// trigger rediscovery per §4.10 guarantee (iii).
    fn dispose_uvn(&self);

    /// Disposes `cell`'s `CELL` instance; must transition that peer to
    /// offline per §4.10 guarantee (ii).
    fn dispose_cell(&self, cell: PeerId);

    fn drain_uvn(&self) -> Vec<TopicEvent<UvnSample>>;
    fn drain_cell(&self) -> Vec<TopicEvent<CellSample>>;
    fn drain_backbone(&self) -> Vec<TopicEvent<BackboneSample>>;

    /// Registers a new user condition, returning a handle shared between
    /// the caller (to trigger it from a worker thread) and the transport
    /// (to observe it during `wait`).
    fn register_condition(&self) -> std::sync::Arc<dyn UserCondition>;

    /// Blocks until a sample, a disposal, a registered condition, or
    /// `timeout` — whichever comes first. Returns true if woken by
    /// activity, false on timeout.
    fn wait(&self, timeout: Duration) -> bool;
}
