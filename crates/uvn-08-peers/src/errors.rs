use shared_types::errors::{Classified, Severity};
use shared_types::ids::PeerId;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PeersError {
    #[error("peer {0} is not registered")]
    UnknownPeer(PeerId),
}

impl Classified for PeersError {
    fn severity(&self) -> Severity {
        Severity::Consistency
    }
}
