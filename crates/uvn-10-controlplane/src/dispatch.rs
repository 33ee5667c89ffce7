//! Fixed wakeup processing order (§4.10): `UVN` samples, then `CELL`, then
//! `BACKBONE`, then user conditions — so identity information is always
//! available before configuration deltas are applied.

use crate::topics::{BackboneSample, CellSample, UvnSample};
use crate::transport::{ControlPlaneTransport, TopicEvent};

/// Callbacks invoked by [`process_wakeup`] in the fixed dispatch order.
/// Implemented by the Agent/Registry orchestration layer; this crate only
/// owns the ordering guarantee, not what each callback does.
pub trait ControlPlaneHandlers {
    fn on_uvn(&mut self, event: TopicEvent<UvnSample>);
    fn on_cell(&mut self, event: TopicEvent<CellSample>);
    fn on_backbone(&mut self, event: TopicEvent<BackboneSample>);
    /// Called once per registered condition still triggered after the
    /// topic samples were drained. Implementations should `clear()` the
    /// condition once they've acted on it.
    fn on_user_condition(&mut self, index: usize);
}

/// Drains every topic in order and dispatches to `handlers`, then checks
/// `conditions` for any still-triggered guard and calls `on_user_condition`
/// for it. Does not block — call after [`ControlPlaneTransport::wait`]
/// returns true, or on a poll tick.
pub fn process_wakeup(
    transport: &dyn ControlPlaneTransport,
    conditions: &[std::sync::Arc<dyn crate::transport::UserCondition>],
    handlers: &mut dyn ControlPlaneHandlers,
) {
    for event in transport.drain_uvn() {
        handlers.on_uvn(event);
    }
    for event in transport.drain_cell() {
        handlers.on_cell(event);
    }
    for event in transport.drain_backbone() {
        handlers.on_backbone(event);
    }
    for (index, condition) in conditions.iter().enumerate() {
        if condition.is_triggered() {
            handlers.on_user_condition(index);
        }
    }
}
