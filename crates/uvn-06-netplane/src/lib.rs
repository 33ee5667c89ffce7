//! # NetworkPlane
//!
//! Kernel-level plumbing the agent needs around its tunnel interfaces
//! (§4.6): IPv4 forwarding, NAT and MSS-clamp iptables rules, a local
//! kernel-route change observer, and the PID-file mutual exclusion that
//! keeps two agent processes from fighting over the same plane.

pub mod errors;
pub mod pidfile;
pub mod plane;
pub mod routes;

pub use errors::NetworkPlaneError;
pub use pidfile::PidFile;
pub use plane::{InterfacePlane, NetworkPlane};
pub use routes::{RouteDelta, RouteObserver};
