//! # Registry
//!
//! The central authority of a UVN (§3, §4.11): owns membership, identity,
//! and the full set of generated tunnel configs, and packages them into
//! the bundles/packages cells and particles are handed. Everything here
//! is local computation over declarative state — no network I/O, no
//! tunnel, NAT or routing ownership, which belongs exclusively to the
//! agent running on each cell.

pub mod bundle;
pub mod errors;
pub mod registry;
pub mod rekey;

pub use bundle::{AgentConfig, ParticlePackage};
pub use errors::RegistryError;
pub use registry::Registry;
pub use rekey::RekeySpin;
