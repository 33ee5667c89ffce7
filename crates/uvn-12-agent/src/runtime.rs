//! The cell agent runtime (§4.11): the process that runs on a cell host,
//! brings up its tunnels, network plane and router, participates in the
//! control plane as `ControlPlaneHandlers`, and periodically probes
//! reachability for the LANs its peers advertise.
//!
//! This struct owns every driver crate built earlier in the workspace —
//! it is the one place they are all wired together. Nothing here talks to
//! the kernel directly; every side effect goes through `uvn_05_tunnel`,
//! `uvn_06_netplane`, `uvn_07_router` or `uvn_09_probe`.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ipnetwork::Ipv4Network;

use shared_bus::EventPublisher;
use shared_types::exec::CommandRunner;
use shared_types::ids::{CellId, PeerId};
use shared_types::net::LanDescriptor;
use shared_types::uvn::{PeerKind, PeerStatus};

use uvn_06_netplane::{InterfacePlane, NetworkPlane, PidFile};
use uvn_07_router::{RouterConfig, RouterDriver, RouterInterface};
use uvn_08_peers::PeerRegistry;
use uvn_09_probe::{ReachabilityProbe, TriggerGate, TriggerReason};
use uvn_10_controlplane::{
    BackboneSample, CellSample, ControlPlaneHandlers, ControlPlaneTransport, TopicEvent, UvnSample,
};
use uvn_11_registry::bundle::AgentConfig;

use crate::bundle::AgentIdentity;
use crate::dashboard::{DashboardSink, DashboardSnapshot};
use crate::errors::AgentError;
use crate::nics;
use crate::services::ServiceHandles;

/// The running agent. Generic over the command runner so tests can swap in
/// a `FakeCommandRunner`; production code uses `SystemCommandRunner`.
pub struct Agent<R: CommandRunner + Clone> {
    runner: R,
    config: AgentConfig,
    identity: AgentIdentity,
    router_config_path: PathBuf,
    pidfile_path: PathBuf,
    pidfile: Option<PidFile>,
    tunnels: uvn_05_tunnel::TunnelDriver<R>,
    plane: NetworkPlane<R>,
    router: Option<RouterDriver<R>>,
    probe: ReachabilityProbe<R>,
    trigger: TriggerGate,
    transport: Arc<dyn ControlPlaneTransport>,
    publisher: Arc<dyn EventPublisher>,
    dashboard: Box<dyn DashboardSink>,
    peers: PeerRegistry,
    handles: ServiceHandles,
    pending_reload: Option<BackboneSample>,
}

impl<R: CommandRunner + Clone> Agent<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: R,
        router_config_path: impl Into<PathBuf>,
        pidfile_path: impl Into<PathBuf>,
        transport: Arc<dyn ControlPlaneTransport>,
        publisher: Arc<dyn EventPublisher>,
        dashboard: Box<dyn DashboardSink>,
        identity: AgentIdentity,
        config: AgentConfig,
    ) -> Self {
        let router_config_path = router_config_path.into();
        let router = Self::build_router(&runner, &router_config_path, &config);
        let trigger = TriggerGate::new(config.timing_profile.tester_max_delay());

        let mut peers = PeerRegistry::new(
            PeerId::Cell(config.cell_id),
            Vec::<(CellId, HashSet<Ipv4Network>)>::new(),
            Vec::<PeerId>::new(),
        );
        peers.learn_peer(PeerId::Cell(config.cell_id), PeerKind::Cell);

        Self {
            tunnels: uvn_05_tunnel::TunnelDriver::new(runner.clone()),
            plane: NetworkPlane::new(runner.clone()),
            probe: ReachabilityProbe::new(runner.clone()),
            router,
            runner,
            router_config_path,
            pidfile_path: pidfile_path.into(),
            pidfile: None,
            trigger,
            transport,
            publisher,
            dashboard,
            peers,
            identity,
            config,
            handles: ServiceHandles::new(),
            pending_reload: None,
        }
    }

    fn build_router(runner: &R, router_config_path: &PathBuf, config: &AgentConfig) -> Option<RouterDriver<R>> {
        if config.backbone_vpn.is_empty() {
            None
        } else {
            Some(RouterDriver::new(runner.clone(), router_config_path))
        }
    }

    /// Claims the process-wide PID file and brings every local service up.
    /// On failure the PID file is released so a retry isn't blocked by a
    /// stale claim from this same attempt.
    #[tracing::instrument(skip(self), fields(cell_id = %self.config.cell_id))]
    pub fn start(&mut self) -> Result<(), AgentError> {
        self.pidfile = Some(PidFile::claim(&self.pidfile_path)?);
        if let Err(e) = self.bring_up() {
            if let Some(pidfile) = self.pidfile.take() {
                let _ = pidfile.release();
            }
            return Err(e);
        }
        Ok(())
    }

    /// Tears every local service down and releases the PID file. Best
    /// effort: a failure to release is logged, not propagated, since the
    /// process is shutting down regardless.
    #[tracing::instrument(skip(self), fields(cell_id = %self.config.cell_id))]
    pub fn stop(&mut self) {
        self.tear_down();
        if let Some(pidfile) = self.pidfile.take() {
            if let Err(e) = pidfile.release() {
                tracing::warn!(error = %e, "failed to release pid file");
            }
        }
    }

    pub(crate) fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub(crate) fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Swaps in a pending configuration (and, if the reload carried fresh
    /// identity material, a new cert/key pair). Rebuilds the router driver
    /// and reachability trigger since both are derived from the config
    /// that just changed.
    pub(crate) fn replace_config(&mut self, config: AgentConfig, identity: Option<AgentIdentity>) {
        self.router = Self::build_router(&self.runner, &self.router_config_path, &config);
        self.trigger = TriggerGate::new(config.timing_profile.tester_max_delay());
        self.config = config;
        if let Some(identity) = identity {
            self.identity = identity;
        }
    }

    /// Validates LAN coverage, starts every tunnel, the network plane, and
    /// (if this cell participates in the backbone) the router, then
    /// publishes this cell's first `CELL` sample. Order matches §4.11:
    /// tunnels before the plane, the plane before the router.
    pub(crate) fn bring_up(&mut self) -> Result<(), AgentError> {
        let nics = nics::detect_local_nics(&self.runner)?;
        nics::validate_lan_coverage(self.config.cell_id, &nics, &self.config.allowed_lans)?;

        let plan = self.tunnel_plan();
        for (tunnel_config, _, _) in &plan {
            let handle = self.tunnels.start(tunnel_config)?;
            self.handles.tunnels.push(handle);
        }

        let interfaces: Vec<InterfacePlane<'_>> = plan
            .iter()
            .map(|(tunnel_config, masquerade, forward)| InterfacePlane {
                interface: &tunnel_config.interface_name,
                masquerade: *masquerade,
                forward: *forward,
            })
            .collect();
        self.plane.start(&interfaces)?;
        self.handles.plane_started = true;

        if let Some(router) = &self.router {
            let router_config = self.router_config();
            let handle = router.start(&router_config)?;
            self.handles.router = Some(handle);
        }

        self.peers.update_peer(PeerId::Cell(self.config.cell_id), |p| {
            p.status = PeerStatus::Online;
            p.registry_id = Some(self.config.registry_id.clone());
            p.start_ts = Some(Utc::now());
        })?;

        self.transport.publish_cell(self.cell_sample());
        tracing::info!(
            cell_id = %self.config.cell_id,
            registry_id = %self.config.registry_id,
            "agent services started"
        );
        Ok(())
    }

    /// Reverses `bring_up` exactly: router, then plane, then tunnels.
    /// Every step is best-effort — a partial teardown must still leave the
    /// agent able to retry `bring_up` from scratch.
    pub(crate) fn tear_down(&mut self) {
        if let (Some(router), Some(handle)) = (&self.router, self.handles.router.take()) {
            router.stop(&handle);
        }
        if self.handles.plane_started {
            self.plane.stop();
            self.handles.plane_started = false;
        }
        for handle in self.handles.tunnels.drain(..) {
            self.tunnels.stop(&handle);
        }
    }

    fn tunnel_plan(&self) -> Vec<(uvn_04_vpnconfig::TunnelConfig, bool, bool)> {
        let mut plan = Vec::new();
        if let Some(tunnel_config) = &self.config.root_vpn {
            let settings = &self.config.settings.root_vpn;
            plan.push((tunnel_config.clone(), settings.masquerade, settings.forward));
        }
        if let Some(tunnel_config) = &self.config.particles_vpn {
            let settings = &self.config.settings.particles_vpn;
            plan.push((tunnel_config.clone(), settings.masquerade, settings.forward));
        }
        for tunnel_config in &self.config.backbone_vpn {
            let settings = &self.config.settings.backbone_vpn.vpn;
            plan.push((tunnel_config.clone(), settings.masquerade, settings.forward));
        }
        plan
    }

    fn router_config(&self) -> RouterConfig {
        let router_id = self
            .config
            .backbone_vpn
            .first()
            .map(|c| c.address.ip())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        let interfaces = self
            .config
            .backbone_vpn
            .iter()
            .map(|c| RouterInterface {
                name: c.interface_name.clone(),
                cost: None,
            })
            .collect();
        RouterConfig {
            router_id,
            area: Ipv4Addr::UNSPECIFIED,
            interfaces,
            local_lans: self.config.allowed_lans.clone(),
            timing_profile: self.config.timing_profile,
        }
    }

    fn cell_sample(&self) -> CellSample {
        let local = self.peers.peer(PeerId::Cell(self.config.cell_id));
        CellSample {
            cell_id: self.config.cell_id,
            uvn_name: self.config.uvn_name.clone(),
            registry_id: self.config.registry_id.clone(),
            routed_networks: local.map(|p| p.routed_networks.clone()).unwrap_or_default(),
            reachable_networks: local.map(|p| p.reachable_networks.clone()).unwrap_or_default(),
            unreachable_networks: local.map(|p| p.unreachable_networks.clone()).unwrap_or_default(),
            start_ts: local.and_then(|p| p.start_ts).unwrap_or_else(Utc::now),
        }
    }

    /// One tick of the agent's event loop: drains control-plane events,
    /// applies a queued hot reload if one arrived, runs a reachability
    /// probe if the trigger gate says it's due, and republishes the local
    /// dashboard snapshot. Meant to be called in a loop by the agent's
    /// binary entrypoint.
    pub async fn run_once(&mut self) -> Result<(), AgentError> {
        let transport = Arc::clone(&self.transport);
        uvn_10_controlplane::process_wakeup(transport.as_ref(), &[], self);

        let registry_id = self.config.registry_id.clone();
        let publisher = Arc::clone(&self.publisher);
        self.peers.process_updates(publisher.as_ref(), Some(&registry_id)).await;

        if let Some(sample) = self.pending_reload.take() {
            crate::reload::apply(self, sample).await?;
        }

        if let Some(reason) = self.trigger.poll(Instant::now()) {
            self.run_probe(reason)?;
        }

        if let Some(local) = self.peers.local().cloned() {
            let snapshot = DashboardSnapshot::from_local(&local, self.peers.peer_count(), self.peers.online_peer_count());
            self.dashboard.publish(&snapshot);
        }

        Ok(())
    }

    fn run_probe(&mut self, reason: TriggerReason) -> Result<(), AgentError> {
        let targets: Vec<LanDescriptor> = self
            .peers
            .remote_peers()
            .flat_map(|p| p.routed_networks.iter().cloned())
            .collect();
        let result = self.probe.probe(&targets)?;

        uvn_telemetry::metrics::REACHABILITY_PROBES_TOTAL
            .with_label_values(&["reachable"])
            .inc_by(result.reachable.len() as f64);
        uvn_telemetry::metrics::REACHABILITY_PROBES_TOTAL
            .with_label_values(&["unreachable"])
            .inc_by(result.unreachable.len() as f64);
        uvn_telemetry::metrics::LOCAL_REACHABLE_NETWORKS.set(result.reachable.len() as f64);

        self.peers.update_peer(PeerId::Cell(self.config.cell_id), |p| {
            p.reachable_networks = result.reachable.clone();
            p.unreachable_networks = result.unreachable.clone();
        })?;

        tracing::debug!(
            ?reason,
            reachable = result.reachable.len(),
            unreachable = result.unreachable.len(),
            "reachability probe tick"
        );
        Ok(())
    }
}

impl<R: CommandRunner + Clone> ControlPlaneHandlers for Agent<R> {
    fn on_uvn(&mut self, event: TopicEvent<UvnSample>) {
        match event {
            TopicEvent::Sample { sample, .. } => {
                let result = self.peers.update_peer(PeerId::Registry, |p| {
                    p.status = PeerStatus::Online;
                    p.registry_id = Some(sample.registry_id.clone());
                });
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to record uvn sample");
                }
            }
            TopicEvent::Disposed { .. } => {
                let result = self.peers.update_peer(PeerId::Registry, |p| p.status = PeerStatus::Offline);
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to mark registry offline");
                }
            }
        }
    }

    fn on_cell(&mut self, event: TopicEvent<CellSample>) {
        match event {
            TopicEvent::Sample { peer, sample } => {
                self.peers.learn_peer(peer, PeerKind::Cell);
                let result = self.peers.update_peer(peer, |p| {
                    p.status = PeerStatus::Online;
                    p.registry_id = Some(sample.registry_id.clone());
                    p.routed_networks = sample.routed_networks.clone();
                    p.reachable_networks = sample.reachable_networks.clone();
                    p.unreachable_networks = sample.unreachable_networks.clone();
                    p.start_ts = Some(sample.start_ts);
                });
                if let Err(e) = result {
                    tracing::warn!(peer = %peer, error = %e, "failed to record cell sample");
                }
            }
            TopicEvent::Disposed { peer } => {
                let result = self.peers.update_peer(peer, |p| p.status = PeerStatus::Offline);
                if let Err(e) = result {
                    tracing::warn!(peer = %peer, error = %e, "failed to mark cell offline");
                }
            }
        }
    }

    fn on_backbone(&mut self, event: TopicEvent<BackboneSample>) {
        if let TopicEvent::Sample { sample, .. } = event {
            if sample.target_cell_id != self.config.cell_id {
                return;
            }
            if sample.registry_id == self.config.registry_id {
                tracing::debug!("ignoring backbone sample for the registry_id already applied");
                return;
            }
            tracing::info!(registry_id = %sample.registry_id, "queued configuration reload");
            self.pending_reload = Some(sample);
        }
    }

    fn on_user_condition(&mut self, index: usize) {
        tracing::debug!(index, "user condition fired with no registered handler");
    }
}
