//! Deployment errors. All variants are `Severity::Configuration`: the
//! registry rejects the request and the UVN's current deployment, if any,
//! is left untouched.

use shared_types::errors::{Classified, Severity};
use shared_types::ids::CellId;

#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error("cell {0} is private and has no public peer to attach to")]
    PrivateCellUnreachable(CellId),
    #[error("backbone graph is disconnected")]
    Disconnected,
    #[error("link subnet pool exhausted after {0} allocations")]
    PoolExhausted(usize),
    #[error("static strategy_args missing or malformed edge list")]
    MalformedEdgeList,
    #[error("static edge list references unknown cell {0}")]
    UnknownCell(CellId),
    #[error("random strategy requires at least one public cell")]
    NoPublicCells,
}

impl Classified for DeploymentError {
    fn severity(&self) -> Severity {
        Severity::Configuration
    }
}
