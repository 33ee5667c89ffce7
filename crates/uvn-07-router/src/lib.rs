//! # RouterDriver
//!
//! Generates an OSPF routing-daemon configuration from a cell's backbone
//! tunnels and locally routed LANs, starts/stops the daemon as a
//! supervised out-of-process service, and exposes its read-only
//! neighbor/route/interface/border/LSA/summary queries (§4.7). Runs only
//! on cell agents, never on the registry.

pub mod config;
pub mod driver;
pub mod errors;

pub use config::{RouterConfig, RouterInterface};
pub use driver::{RouterDriver, RouterHandle, RouterQuery};
pub use errors::RouterError;
