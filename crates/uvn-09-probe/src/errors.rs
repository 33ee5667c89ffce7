use shared_types::errors::{Classified, Severity};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to probe gateway {0}: {1}")]
    PingFailed(String, String),
    #[error("failed to resolve next hop for {0}: {1}")]
    NextHopFailed(String, String),
}

impl Classified for ProbeError {
    fn severity(&self) -> Severity {
        Severity::Liveness
    }
}
