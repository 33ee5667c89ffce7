//! # Agent
//!
//! The cell agent runtime (§4.11): loads a bundle produced by
//! `uvn_11_registry`, verifies its host's interfaces cover the cell's
//! declared LANs, claims the mutual-exclusion PID file, and brings up
//! tunnels, the network plane, the router, the control plane and the
//! reachability probe in the fixed start order — then tears them down in
//! reverse on stop or on a hot reload triggered by a new `BACKBONE`
//! sample.
//!
//! This is the orchestration layer: it owns no kernel state itself, only
//! the driver crates (`uvn_05_tunnel`, `uvn_06_netplane`, `uvn_07_router`,
//! `uvn_09_probe`) that do.

pub mod bundle;
pub mod dashboard;
pub mod errors;
pub mod nics;
mod reload;
pub mod services;

pub mod runtime;

pub use bundle::{unpack_bundle, AgentIdentity};
pub use dashboard::{DashboardSink, DashboardSnapshot, NoopDashboard};
pub use errors::AgentError;
pub use nics::{detect_local_nics, validate_lan_coverage};
pub use runtime::Agent;
pub use services::ServiceHandles;
