//! Fixed dispatch order (§4.10) driving peer-state transitions (§4.8)
//! through a real in-memory control plane and event bus — the wiring
//! `uvn_12_agent::runtime::Agent` does, exercised directly so a liveliness
//! loss (scenario 6 of §8) can be asserted without bringing up tunnels.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use shared_bus::{EventFilter, InMemoryEventBus, UvnEvent};
    use shared_types::ids::{CellId, PeerId};
    use shared_types::uvn::{PeerKind, PeerStatus, Uvn};
    use uvn_08_peers::PeerRegistry;
    use uvn_10_controlplane::dispatch::{process_wakeup, ControlPlaneHandlers};
    use uvn_10_controlplane::inmem::InMemoryControlPlane;
    use uvn_10_controlplane::topics::{BackboneSample, CellSample, UvnSample};
    use uvn_10_controlplane::transport::{ControlPlaneTransport, TopicEvent};

    /// Mirrors `Agent`'s `ControlPlaneHandlers` impl closely enough to
    /// drive a `PeerRegistry` the same way, minus anything tunnel/router
    /// related — this is the slice of the orchestration under test.
    struct RecordingHandlers {
        peers: PeerRegistry,
        bus: Arc<InMemoryEventBus>,
        dispatch_order: Vec<&'static str>,
    }

    impl ControlPlaneHandlers for RecordingHandlers {
        fn on_uvn(&mut self, _event: TopicEvent<UvnSample>) {
            self.dispatch_order.push("uvn");
        }

        fn on_cell(&mut self, event: TopicEvent<CellSample>) {
            self.dispatch_order.push("cell");
            if let TopicEvent::Sample { peer, sample } = event {
                self.peers.learn_peer(peer, PeerKind::Cell);
                self.peers
                    .update_peer(peer, |p| {
                        p.status = PeerStatus::Online;
                        p.registry_id = Some(sample.registry_id.clone());
                        p.routed_networks = sample.routed_networks.clone();
                        p.reachable_networks = sample.reachable_networks.clone();
                    })
                    .unwrap();
            } else if let TopicEvent::Disposed { peer } = event {
                self.peers.update_peer(peer, |p| p.status = PeerStatus::Offline).unwrap();
            }
        }

        fn on_backbone(&mut self, _event: TopicEvent<BackboneSample>) {
            self.dispatch_order.push("backbone");
        }

        fn on_user_condition(&mut self, _index: usize) {
            self.dispatch_order.push("condition");
        }
    }

    fn uvn_with_cells(n: u32) -> Uvn {
        let mut uvn = Uvn::new("home", "alice");
        for i in 0..n {
            uvn.add_cell(format!("cell{i}"), "alice", None, vec![], false).unwrap();
        }
        uvn
    }

    fn drain(sub: &mut shared_bus::Subscription) -> Vec<UvnEvent> {
        let mut out = Vec::new();
        while let Ok(Some(event)) = sub.try_recv() {
            out.push(event);
        }
        out
    }

    fn cell_sample(id: CellId, registry_id: &str) -> CellSample {
        CellSample {
            cell_id: id,
            uvn_name: "home".to_string(),
            registry_id: registry_id.to_string(),
            routed_networks: vec![],
            reachable_networks: vec![],
            unreachable_networks: vec![],
            start_ts: Utc::now(),
        }
    }

    #[tokio::test]
    async fn a_cell_going_offline_clears_all_cells_connected() {
        let uvn = uvn_with_cells(2);
        let mut peers = PeerRegistry::from_uvn(&uvn, PeerId::Registry);
        peers.update_peer(PeerId::Registry, |p| p.status = PeerStatus::Online).unwrap();

        let transport = InMemoryControlPlane::new();
        let bus = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe(EventFilter::all());

        let cell_a = CellId::new(1);
        let cell_b = CellId::new(2);

        transport.publish_cell(cell_sample(cell_a, "gen-1"));
        transport.publish_cell(cell_sample(cell_b, "gen-1"));

        let mut handlers = RecordingHandlers {
            peers,
            bus: bus.clone(),
            dispatch_order: Vec::new(),
        };
        process_wakeup(&transport, &[], &mut handlers);
        handlers.peers.process_updates(&*handlers.bus, None).await;

        let events = drain(&mut sub);
        assert!(events.iter().any(|e| matches!(e, UvnEvent::AllCellsConnected)));

        // cell b crashes: its CELL instance is disposed, which must drive
        // it offline and flip all_cells_connected back to false with an
        // updated online_cells set that no longer contains it.
        transport.dispose_cell(PeerId::Cell(cell_b));
        process_wakeup(&transport, &[], &mut handlers);
        handlers.peers.process_updates(&*handlers.bus, None).await;

        let events = drain(&mut sub);
        let online_cells_event = events.iter().find(|e| matches!(e, UvnEvent::OnlineCells(_)));
        match online_cells_event {
            Some(UvnEvent::OnlineCells(online)) => {
                assert!(online.contains(&cell_a));
                assert!(!online.contains(&cell_b));
            }
            other => panic!("expected an OnlineCells event, got {other:?}"),
        }
        assert!(!events.iter().any(|e| matches!(e, UvnEvent::AllCellsConnected)));

        assert_eq!(handlers.dispatch_order, vec!["cell", "cell", "cell"]);
    }

    #[test]
    fn process_wakeup_drains_uvn_before_cell_before_backbone_before_conditions() {
        let transport = InMemoryControlPlane::new();
        let condition = transport.register_condition();
        condition.trigger();

        transport.publish_cell(cell_sample(CellId::new(1), "gen-1"));
        transport.publish_uvn(UvnSample {
            uvn_name: "home".to_string(),
            registry_id: "gen-1".to_string(),
        });
        transport.publish_backbone(BackboneSample {
            target_cell_id: CellId::new(1),
            uvn_name: "home".to_string(),
            registry_id: "gen-1".to_string(),
            payload: uvn_10_controlplane::topics::BackbonePayload::SignedEncryptedPackage(vec![]),
        });

        let uvn = uvn_with_cells(1);
        let peers = PeerRegistry::from_uvn(&uvn, PeerId::Registry);
        let bus = Arc::new(InMemoryEventBus::new());
        let mut handlers = RecordingHandlers {
            peers,
            bus,
            dispatch_order: Vec::new(),
        };

        process_wakeup(&transport, &[condition], &mut handlers);

        assert_eq!(handlers.dispatch_order, vec!["uvn", "cell", "backbone", "condition"]);
    }
}
