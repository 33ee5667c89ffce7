use shared_types::errors::{Classified, Severity};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    #[error("failed to write router config to {0}: {1}")]
    ConfigWriteFailed(String, String),
    #[error("failed to start routing daemon: {0}")]
    StartFailed(String),
    #[error("failed to stop routing daemon: {0}")]
    StopFailed(String),
    #[error("router query '{0}' failed: {1}")]
    QueryFailed(String, String),
    #[error("router query '{0}' returned output that could not be parsed: {1}")]
    QueryParseFailed(String, String),
}

impl Classified for RouterError {
    fn severity(&self) -> Severity {
        match self {
            Self::ConfigWriteFailed(_, _) => Severity::Configuration,
            _ => Severity::Network,
        }
    }
}
