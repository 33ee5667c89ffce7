use shared_types::errors::{Classified, Severity};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("write to topic {0} failed: {1}")]
    WriteFailed(String, String),
    #[error("waitset wait failed: {0}")]
    WaitFailed(String),
}

impl Classified for ControlPlaneError {
    fn severity(&self) -> Severity {
        Severity::Network
    }
}
