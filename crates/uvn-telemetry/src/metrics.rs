//! Prometheus metrics for UVN agents and registries.
//!
//! Metric names follow `uvn_<area>_<name>_<unit>`.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    // ---------------------------------------------------------------
    // Peers (§4.8)
    // ---------------------------------------------------------------

    /// Peers currently online, by kind (cell/particle/registry).
    pub static ref PEERS_ONLINE: GaugeVec = GaugeVec::new(
        Opts::new("uvn_peers_online", "Peers currently reporting as online"),
        &["kind"]
    ).expect("metric creation failed");

    /// Total liveliness transitions observed (online -> offline or back).
    pub static ref PEER_STATUS_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("uvn_peer_status_transitions_total", "Peer online/offline transitions"),
        &["kind", "to_status"]
    ).expect("metric creation failed");

    // ---------------------------------------------------------------
    // VPN tunnels (§4.5)
    // ---------------------------------------------------------------

    /// Seconds since the last WireGuard handshake, per peer.
    pub static ref VPN_HANDSHAKE_AGE_SECONDS: GaugeVec = GaugeVec::new(
        Opts::new("uvn_vpn_handshake_age_seconds", "Age of the last handshake for a tunnel"),
        &["peer", "interface"]
    ).expect("metric creation failed");

    /// Tunnel link up/down transitions.
    pub static ref VPN_LINK_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("uvn_vpn_link_transitions_total", "VPN link online/offline transitions"),
        &["peer", "interface", "to_status"]
    ).expect("metric creation failed");

    // ---------------------------------------------------------------
    // Registry / Agent lifecycle (§4.11)
    // ---------------------------------------------------------------

    /// Time spent regenerating config for a `configure()`/`deploy()` call.
    pub static ref CONFIG_GENERATION_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "uvn_registry_config_generation_duration_seconds",
            "Time spent regenerating UVN configuration"
        ).buckets(exponential_buckets(0.01, 2.0, 12).unwrap())
    ).expect("metric creation failed");

    /// Total config generations produced by the registry.
    pub static ref CONFIG_GENERATIONS_TOTAL: Counter = Counter::new(
        "uvn_registry_config_generations_total",
        "Total number of config generations produced"
    ).expect("metric creation failed");

    /// Total hot reloads applied by an agent, by outcome.
    pub static ref AGENT_RELOADS: CounterVec = CounterVec::new(
        Opts::new("uvn_agent_reloads_total", "Agent configuration reloads"),
        &["outcome"]  // outcome: applied/rolled_back
    ).expect("metric creation failed");

    // ---------------------------------------------------------------
    // Reachability probe (§4.9)
    // ---------------------------------------------------------------

    /// Total reachability probes run.
    pub static ref REACHABILITY_PROBES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("uvn_probe_runs_total", "Reachability probe executions"),
        &["outcome"]  // outcome: reachable/unreachable
    ).expect("metric creation failed");

    /// Networks currently reachable by direct probing.
    pub static ref LOCAL_REACHABLE_NETWORKS: Gauge = Gauge::new(
        "uvn_probe_local_reachable_networks",
        "Networks currently reachable by this agent's probe"
    ).expect("metric creation failed");

    // ---------------------------------------------------------------
    // Control plane (§4.10)
    // ---------------------------------------------------------------

    /// Messages sent on the control plane, by topic.
    pub static ref CONTROLPLANE_MESSAGES_SENT: CounterVec = CounterVec::new(
        Opts::new("uvn_controlplane_messages_sent_total", "Control-plane messages sent"),
        &["topic"]
    ).expect("metric creation failed");

    /// Messages received on the control plane, by topic.
    pub static ref CONTROLPLANE_MESSAGES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("uvn_controlplane_messages_received_total", "Control-plane messages received"),
        &["topic"]
    ).expect("metric creation failed");

    /// Control-plane message round-trip latency.
    pub static ref CONTROLPLANE_LATENCY: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "uvn_controlplane_delivery_latency_seconds",
            "Control-plane message delivery latency"
        ).buckets(exponential_buckets(0.001, 2.0, 12).unwrap()),
        &["topic"]
    ).expect("metric creation failed");

    // ---------------------------------------------------------------
    // Errors
    // ---------------------------------------------------------------

    /// Errors by originating component and severity.
    pub static ref COMPONENT_ERRORS: CounterVec = CounterVec::new(
        Opts::new("uvn_component_errors_total", "Errors by component and severity"),
        &["component", "severity"]
    ).expect("metric creation failed");
}

/// Handle for the metrics registry. Keep alive for the lifetime of the
/// process; dropping it does not unregister metrics.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PEERS_ONLINE.clone()),
        Box::new(PEER_STATUS_TRANSITIONS.clone()),
        Box::new(VPN_HANDSHAKE_AGE_SECONDS.clone()),
        Box::new(VPN_LINK_TRANSITIONS.clone()),
        Box::new(CONFIG_GENERATION_DURATION.clone()),
        Box::new(CONFIG_GENERATIONS_TOTAL.clone()),
        Box::new(AGENT_RELOADS.clone()),
        Box::new(REACHABILITY_PROBES_TOTAL.clone()),
        Box::new(LOCAL_REACHABLE_NETWORKS.clone()),
        Box::new(CONTROLPLANE_MESSAGES_SENT.clone()),
        Box::new(CONTROLPLANE_MESSAGES_RECEIVED.clone()),
        Box::new(CONTROLPLANE_LATENCY.clone()),
        Box::new(COMPONENT_ERRORS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    #[must_use]
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_metrics_succeeds_or_is_already_registered() {
        let result = register_metrics();
        let _ = result;
    }

    #[test]
    fn gauge_set_and_read() {
        LOCAL_REACHABLE_NETWORKS.set(3.0);
        assert_eq!(LOCAL_REACHABLE_NETWORKS.get(), 3.0);
    }

    #[test]
    fn histogram_timer_observes_on_drop() {
        let _timer = HistogramTimer::new(&CONFIG_GENERATION_DURATION);
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}
