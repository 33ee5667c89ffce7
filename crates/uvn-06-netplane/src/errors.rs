use shared_types::errors::{Classified, Severity};

#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkPlaneError {
    #[error("failed to enable kernel ipv4 forwarding: {0}")]
    ForwardingFailed(String),
    #[error("failed to install NAT masquerade rule for {0}: {1}")]
    MasqueradeFailed(String, String),
    #[error("failed to install TCP-MSS clamp rule: {0}")]
    MssClampFailed(String),
    #[error("failed to install docker forward rule {0}<->{1}: {2}")]
    DockerForwardFailed(String, String, String),
    #[error("another agent is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("failed to claim pid file {0}: {1}")]
    PidFileFailed(String, String),
    #[error("failed to list kernel routes: {0}")]
    RouteListFailed(String),
}

impl Classified for NetworkPlaneError {
    fn severity(&self) -> Severity {
        match self {
            Self::AlreadyRunning(_) => Severity::Configuration,
            _ => Severity::Network,
        }
    }
}
