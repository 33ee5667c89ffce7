//! # TunnelDriver
//!
//! Programs WireGuard tunnel interfaces into the kernel from the configs
//! `uvn-04-vpnconfig` produces (§4.5): create/bring-up/tear-down, the
//! allowed-IPs diff fast path used to announce newly routed LANs without
//! a full interface reconfigure, and per-peer liveness stats. Talks to
//! the host only through `ip`/`wg`, routed via `shared_types::CommandRunner`
//! so the orchestration logic is testable without root or a real NIC.

pub mod driver;
pub mod errors;
pub mod stats;

pub use driver::{TunnelDriver, TunnelHandle};
pub use errors::TunnelError;
pub use stats::{PeerStat, LIVENESS_WINDOW_SECS};
