//! Error taxonomy for the Agent. Subsystem errors are re-exported
//! unchanged (each already carries its own [`Severity`]); this crate adds
//! the orchestration-level variants: LAN-coverage rejection at startup,
//! bundle/package decoding, pending-config validation, and the
//! `spin_until_consistent` timeout of §5.

use shared_types::errors::{Classified, Severity};
use shared_types::ids::CellId;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Tunnel(#[from] uvn_05_tunnel::TunnelError),
    #[error(transparent)]
    NetworkPlane(#[from] uvn_06_netplane::NetworkPlaneError),
    #[error(transparent)]
    Router(#[from] uvn_07_router::RouterError),
    #[error(transparent)]
    Probe(#[from] uvn_09_probe::ProbeError),
    #[error(transparent)]
    KeyMaterial(#[from] uvn_02_keymaterial::KeyMaterialError),
    #[error(transparent)]
    Peers(#[from] uvn_08_peers::PeersError),

    /// Detected local interfaces do not cover cell {0}'s declared
    /// `allowed_lans`; startup is refused (§4.11). This is a runtime
    /// rejection at the agent, not the registry, so it is carried here
    /// rather than as `shared_types::uvn::UvnError`.
    #[error("local network interfaces do not cover cell {0}'s allowed_lans: missing {1}")]
    LanNotCovered(CellId, ipnetwork::Ipv4Network),

    #[error("failed to parse detected network interfaces: {0}")]
    NicDetectionFailed(String),

    #[error("failed to read bundle archive: {0}")]
    Archive(String),

    #[error("failed to parse agent configuration: {0}")]
    ConfigParse(String),

    #[error("pending configuration failed validation: {0}")]
    InvalidPendingConfig(String),

    #[error("another agent process already holds the network plane")]
    AlreadyRunning,

    #[error("spin_until_{operation} exceeded {0:?}", operation = .1)]
    SpinTimeout(std::time::Duration, &'static str),

    #[error("rollback after a failed reload also failed: {0}")]
    RollbackFailed(String),

    #[error("the backbone sample targeted a different registry_id ({expected}) than the bundle we hold ({actual})")]
    RegistryIdMismatch { expected: String, actual: String },
}

impl Classified for AgentError {
    fn severity(&self) -> Severity {
        match self {
            Self::Tunnel(e) => e.severity(),
            Self::NetworkPlane(e) => e.severity(),
            Self::Router(e) => e.severity(),
            Self::Probe(e) => e.severity(),
            Self::KeyMaterial(e) => e.severity(),
            Self::Peers(e) => e.severity(),
            Self::LanNotCovered(..) | Self::NicDetectionFailed(_) => Severity::Network,
            Self::Archive(_) | Self::ConfigParse(_) | Self::InvalidPendingConfig(_) => Severity::Identity,
            Self::AlreadyRunning => Severity::Configuration,
            Self::SpinTimeout(..) => Severity::Timeout,
            Self::RollbackFailed(_) => Severity::External,
            Self::RegistryIdMismatch { .. } => Severity::Consistency,
        }
    }
}
