//! # Error Kind Taxonomy
//!
//! Mirrors the kinds from the design's error handling section: every
//! concrete error type in a `uvn-*` crate carries a [`Severity`] so that
//! Agent-level orchestration can decide whether to isolate or propagate a
//! failure without downcasting to a concrete error type.

use std::fmt;

/// Broad classification of an error, independent of which subsystem raised it.
///
/// Runtime code (the Agent) isolates errors per-subsystem so that, e.g., a
/// router failure does not tear tunnels down, while command operations
/// (registry mutations, CLI) surface the first error and roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Rejected before anything was produced (overlapping LANs, duplicate
    /// addresses, a private-only mesh). Never surfaces at runtime.
    Configuration,
    /// Missing CA, cert/key mismatch, HMAC verification failure on decrypt.
    /// Fatal to the operation; leaves the filesystem unchanged.
    Identity,
    /// Kernel command failure, NAT rule collision. Fatal to `start`; `stop`
    /// is best-effort and logs per-rule failures instead of aborting.
    Network,
    /// A peer missed its liveliness window. Transitions the peer to
    /// `offline` and surfaces an event; never triggers a restart.
    Liveness,
    /// Registry IDs disagree across the fleet. Surfaced via event and
    /// dashboard; agents keep running on their current configuration.
    Consistency,
    /// A `spin_until_*` wait exceeded its deadline. Raised to the caller;
    /// never commits partial state.
    Timeout,
    /// Router daemon crash, probe command unavailable. Runs in a degraded
    /// mode that the dashboard can surface.
    External,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Identity => "identity",
            Self::Network => "network",
            Self::Liveness => "liveness",
            Self::Consistency => "consistency",
            Self::Timeout => "timeout",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// Implemented by every per-crate error enum so callers can inspect the
/// propagation policy for an error without matching on its variants.
pub trait Classified {
    fn severity(&self) -> Severity;

    /// Command operations roll back on the first error of any kind.
    /// Runtime code only rolls back on kinds that corrupt dependent state.
    fn fatal_to_dependents(&self) -> bool {
        matches!(
            self.severity(),
            Severity::Configuration | Severity::Identity | Severity::Network | Severity::Timeout
        )
    }
}
