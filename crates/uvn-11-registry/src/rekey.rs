//! Spin-until-rekeyed state machine (§4.11).
//!
//! A rekey produces a parallel next-generation identity: old credentials
//! stay valid until every affected cell has been observed reporting the
//! new `registry_id`. This module only tracks the waiting; the actual
//! observation comes from whatever is polling cell samples off the
//! control plane (the Agent/registry binary wiring), fed in via
//! [`RekeySpin::observe`].

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use shared_types::ids::CellId;
use uvn_02_keymaterial::RekeyScope;

use crate::errors::RegistryError;

/// One in-flight rekey transition: the new `registry_id` has already been
/// published; we are waiting for `expected` to shrink to empty as cells
/// report back the new generation.
pub struct RekeySpin {
    pub scope: RekeyScope,
    pub old_registry_id: String,
    pub new_registry_id: String,
    expected: BTreeSet<CellId>,
    started_at: Instant,
    max_spin_time: Duration,
}

impl RekeySpin {
    pub fn new(scope: RekeyScope, old_registry_id: String, new_registry_id: String, expected: BTreeSet<CellId>, max_spin_time: Duration) -> Self {
        Self {
            scope,
            old_registry_id,
            new_registry_id,
            expected,
            started_at: Instant::now(),
            max_spin_time,
        }
    }

    /// Records that `cell` was observed reporting `registry_id`. Returns
    /// whether every expected cell has now reported the new generation.
    pub fn observe(&mut self, cell: CellId, registry_id: &str) -> bool {
        if registry_id == self.new_registry_id {
            self.expected.remove(&cell);
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.expected.is_empty()
    }

    pub fn pending_cells(&self) -> &BTreeSet<CellId> {
        &self.expected
    }

    /// Returns a timeout error if `max_spin_time` has elapsed without
    /// completing. Callers poll this on every control-plane wakeup.
    pub fn check_timeout(&self) -> Result<(), RegistryError> {
        if !self.is_complete() && self.started_at.elapsed() >= self.max_spin_time {
            return Err(RegistryError::RekeySpinTimeout("new registry_id", self.max_spin_time));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_completes_once_every_expected_cell_reports_the_new_generation() {
        let expected: BTreeSet<CellId> = [CellId::new(1), CellId::new(2)].into_iter().collect();
        let mut spin = RekeySpin::new(
            RekeyScope::Uvn { drop_keys_root_vpn: false, drop_keys_particles_vpn: false, drop_keys_dds: false },
            "gen-1".to_string(),
            "gen-2".to_string(),
            expected,
            Duration::from_secs(60),
        );
        assert!(!spin.observe(CellId::new(1), "gen-2"));
        assert!(spin.observe(CellId::new(2), "gen-2"));
        assert!(spin.is_complete());
    }

    #[test]
    fn reports_under_the_old_generation_do_not_count() {
        let expected: BTreeSet<CellId> = [CellId::new(1)].into_iter().collect();
        let mut spin = RekeySpin::new(
            RekeyScope::Cell(CellId::new(1)),
            "gen-1".to_string(),
            "gen-2".to_string(),
            expected,
            Duration::from_secs(60),
        );
        assert!(!spin.observe(CellId::new(1), "gen-1"));
        assert!(!spin.is_complete());
    }

    #[test]
    fn timeout_is_reported_once_max_spin_time_elapses() {
        let expected: BTreeSet<CellId> = [CellId::new(1)].into_iter().collect();
        let spin = RekeySpin::new(
            RekeyScope::Cell(CellId::new(1)),
            "gen-1".to_string(),
            "gen-2".to_string(),
            expected,
            Duration::from_millis(0),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(spin.check_timeout().is_err());
    }
}
