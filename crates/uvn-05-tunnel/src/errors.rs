use shared_types::errors::{Classified, Severity};

#[derive(Debug, Clone, thiserror::Error)]
pub enum TunnelError {
    #[error("failed to check whether interface {0} exists: {1}")]
    LinkShowFailed(String, String),
    #[error("failed to delete existing interface {0}: {1}")]
    DeleteFailed(String, String),
    #[error("failed to create interface {0}: {1}")]
    CreateFailed(String, String),
    #[error("failed to set MTU on interface {0}: {1}")]
    SetMtuFailed(String, String),
    #[error("failed to flush addresses on interface {0}: {1}")]
    FlushAddressFailed(String, String),
    #[error("failed to assign address on interface {0}: {1}")]
    SetAddressFailed(String, String),
    #[error("failed to bring interface {0} up: {1}")]
    BringUpFailed(String, String),
    #[error("failed to program wireguard config on interface {0}: {1}")]
    WgSetFailed(String, String),
    #[error("failed to query interface {0} stats: {1}")]
    StatFailed(String, String),
    #[error("failed to parse wg show output for interface {0}")]
    StatParseFailed(String),
    #[error("command execution error on interface {0}: {1}")]
    Io(String, String),
}

impl Classified for TunnelError {
    fn severity(&self) -> Severity {
        Severity::Network
    }
}
