//! The default in-process transport (§4.10): three queues guarded by a
//! shared activity signal, used in place of a real DDS participant. This
//! is sufficient to drive the Agent's waitset loop end to end in tests and
//! single-process deployments; a DDS-backed transport is an external
//! collaborator left unimplemented, per the design note on transport
//! plugins.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use shared_types::ids::PeerId;

use crate::topics::{BackboneSample, CellSample, UvnSample};
use crate::transport::{ControlPlaneTransport, TopicEvent, UserCondition};

struct Signal {
    woken: Mutex<bool>,
    condvar: Condvar,
}

impl Signal {
    fn new() -> Self {
        Self {
            woken: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn raise(&self) {
        let mut woken = self.woken.lock().expect("signal mutex poisoned");
        *woken = true;
        self.condvar.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let woken = self.woken.lock().expect("signal mutex poisoned");
        let (mut woken, _) = self
            .condvar
            .wait_timeout_while(woken, timeout, |w| !*w)
            .expect("signal mutex poisoned");
        let fired = *woken;
        *woken = false;
        fired
    }
}

struct ConditionHandle {
    flag: AtomicBool,
    signal: Arc<Signal>,
}

impl UserCondition for ConditionHandle {
    fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.signal.raise();
    }

    fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct InMemoryControlPlane {
    uvn: Mutex<VecDeque<TopicEvent<UvnSample>>>,
    cell: Mutex<VecDeque<TopicEvent<CellSample>>>,
    backbone: Mutex<VecDeque<TopicEvent<BackboneSample>>>,
    signal: Arc<Signal>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self {
            uvn: Mutex::new(VecDeque::new()),
            cell: Mutex::new(VecDeque::new()),
            backbone: Mutex::new(VecDeque::new()),
            signal: Arc::new(Signal::new()),
        }
    }
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPlaneTransport for InMemoryControlPlane {
    fn publish_uvn(&self, sample: UvnSample) {
        self.uvn.lock().expect("uvn queue poisoned").push_back(TopicEvent::Sample {
            peer: PeerId::Registry,
            sample,
        });
        self.signal.raise();
    }

    fn publish_cell(&self, sample: CellSample) {
        let peer = PeerId::Cell(sample.cell_id);
        self.cell.lock().expect("cell queue poisoned").push_back(TopicEvent::Sample { peer, sample });
        self.signal.raise();
    }

    fn publish_backbone(&self, sample: BackboneSample) {
        self.backbone
            .lock()
            .expect("backbone queue poisoned")
            .push_back(TopicEvent::Sample { peer: PeerId::Registry, sample });
        self.signal.raise();
    }

    fn dispose_uvn(&self) {
        self.uvn
            .lock()
            .expect("uvn queue poisoned")
            .push_back(TopicEvent::Disposed { peer: PeerId::Registry });
        self.signal.raise();
    }

    fn dispose_cell(&self, cell: PeerId) {
        self.cell.lock().expect("cell queue poisoned").push_back(TopicEvent::Disposed { peer: cell });
        self.signal.raise();
    }

    fn drain_uvn(&self) -> Vec<TopicEvent<UvnSample>> {
        self.uvn.lock().expect("uvn queue poisoned").drain(..).collect()
    }

    fn drain_cell(&self) -> Vec<TopicEvent<CellSample>> {
        self.cell.lock().expect("cell queue poisoned").drain(..).collect()
    }

    fn drain_backbone(&self) -> Vec<TopicEvent<BackboneSample>> {
        self.backbone.lock().expect("backbone queue poisoned").drain(..).collect()
    }

    fn register_condition(&self) -> Arc<dyn UserCondition> {
        Arc::new(ConditionHandle {
            flag: AtomicBool::new(false),
            signal: self.signal.clone(),
        })
    }

    fn wait(&self, timeout: Duration) -> bool {
        self.signal.wait(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared_types::ids::CellId;

    #[test]
    fn publish_then_drain_returns_the_sample() {
        let transport = InMemoryControlPlane::new();
        transport.publish_uvn(UvnSample {
            uvn_name: "test".to_string(),
            registry_id: "gen-1".to_string(),
        });
        let events = transport.drain_uvn();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TopicEvent::Sample { peer: PeerId::Registry, .. }));
    }

    #[test]
    fn drain_without_publish_is_empty() {
        let transport = InMemoryControlPlane::new();
        assert!(transport.drain_cell().is_empty());
    }

    #[test]
    fn dispose_is_observed_as_a_distinct_event_from_samples() {
        let transport = InMemoryControlPlane::new();
        transport.publish_cell(CellSample {
            cell_id: CellId::new(1),
            uvn_name: "test".to_string(),
            registry_id: "gen-1".to_string(),
            routed_networks: vec![],
            reachable_networks: vec![],
            unreachable_networks: vec![],
            start_ts: Utc::now(),
        });
        transport.dispose_cell(PeerId::Cell(CellId::new(1)));
        let events = transport.drain_cell();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TopicEvent::Sample { .. }));
        assert!(matches!(events[1], TopicEvent::Disposed { peer: PeerId::Cell(_) }));
    }

    #[test]
    fn wait_returns_true_immediately_when_already_signaled() {
        let transport = InMemoryControlPlane::new();
        transport.publish_uvn(UvnSample {
            uvn_name: "test".to_string(),
            registry_id: "gen-1".to_string(),
        });
        assert!(transport.wait(Duration::from_millis(50)));
    }

    #[test]
    fn wait_times_out_with_no_activity() {
        let transport = InMemoryControlPlane::new();
        assert!(!transport.wait(Duration::from_millis(10)));
    }

    #[test]
    fn user_condition_wakes_the_waitset() {
        let transport = InMemoryControlPlane::new();
        let condition = transport.register_condition();
        condition.trigger();
        assert!(condition.is_triggered());
        assert!(transport.wait(Duration::from_millis(50)));
        condition.clear();
        assert!(!condition.is_triggered());
    }
}
