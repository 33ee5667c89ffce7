//! Trigger-condition bookkeeping for the reachability probe (§4.9): fires
//! when routed networks change, when local kernel routes change, or when
//! `max_trigger_delay` elapses since the last probe — whichever comes
//! first.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    RoutedNetworksChanged,
    LocalRoutesChanged,
    MaxDelayElapsed,
}

/// Tracks pending external trigger conditions and the timeout deadline.
/// `notify_*` is called from the event loop when the corresponding
/// condition is observed; `poll` is called once per wakeup (either a
/// notify or the timeout) and returns the reason to probe now, if any.
pub struct TriggerGate {
    max_delay: Duration,
    last_probe: Option<Instant>,
    routed_networks_changed: bool,
    local_routes_changed: bool,
}

impl TriggerGate {
    pub fn new(max_delay: Duration) -> Self {
        Self {
            max_delay,
            last_probe: None,
            routed_networks_changed: false,
            local_routes_changed: false,
        }
    }

    pub fn notify_routed_networks_changed(&mut self) {
        self.routed_networks_changed = true;
    }

    pub fn notify_local_routes_changed(&mut self) {
        self.local_routes_changed = true;
    }

    /// The maximum time a caller should wait before calling `poll` again.
    pub fn wait_timeout(&self, now: Instant) -> Duration {
        match self.last_probe {
            None => Duration::ZERO,
            Some(last) => self.max_delay.saturating_sub(now.saturating_duration_since(last)),
        }
    }

    /// Checks whether a probe is due and, if so, clears the flags and
    /// records `now` as the last probe time.
    pub fn poll(&mut self, now: Instant) -> Option<TriggerReason> {
        let reason = if self.routed_networks_changed {
            Some(TriggerReason::RoutedNetworksChanged)
        } else if self.local_routes_changed {
            Some(TriggerReason::LocalRoutesChanged)
        } else if self.last_probe.is_none_or_elapsed(now, self.max_delay) {
            Some(TriggerReason::MaxDelayElapsed)
        } else {
            None
        };

        if reason.is_some() {
            self.routed_networks_changed = false;
            self.local_routes_changed = false;
            self.last_probe = Some(now);
        }
        reason
    }
}

trait ElapsedCheck {
    fn is_none_or_elapsed(&self, now: Instant, max_delay: Duration) -> bool;
}

impl ElapsedCheck for Option<Instant> {
    fn is_none_or_elapsed(&self, now: Instant, max_delay: Duration) -> bool {
        match self {
            None => true,
            Some(last) => now.saturating_duration_since(*last) >= max_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_poll_always_fires_on_max_delay() {
        let mut gate = TriggerGate::new(Duration::from_secs(30));
        let now = Instant::now();
        assert_eq!(gate.poll(now), Some(TriggerReason::MaxDelayElapsed));
    }

    #[test]
    fn explicit_notify_preempts_the_timeout() {
        let mut gate = TriggerGate::new(Duration::from_secs(3600));
        let now = Instant::now();
        gate.poll(now);
        gate.notify_routed_networks_changed();
        assert_eq!(gate.poll(now), Some(TriggerReason::RoutedNetworksChanged));
    }

    #[test]
    fn no_trigger_between_notifies_and_before_deadline() {
        let mut gate = TriggerGate::new(Duration::from_secs(3600));
        let now = Instant::now();
        gate.poll(now);
        assert_eq!(gate.poll(now), None);
    }

    #[test]
    fn local_routes_changed_is_lower_priority_than_routed_networks() {
        let mut gate = TriggerGate::new(Duration::from_secs(3600));
        let now = Instant::now();
        gate.poll(now);
        gate.notify_local_routes_changed();
        gate.notify_routed_networks_changed();
        assert_eq!(gate.poll(now), Some(TriggerReason::RoutedNetworksChanged));
    }
}
