//! Timing profiles.
//!
//! Derives concrete durations for liveliness leases, hello intervals and
//! trigger delays from a single `default`/`fast` knob, matching the
//! reference implementation's `TimingProfile` enum.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimingProfile {
    #[default]
    Default,
    Fast,
}

impl TimingProfile {
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().replace('-', "_").as_str() {
            "default" => Some(Self::Default),
            "fast" => Some(Self::Fast),
            _ => None,
        }
    }

    /// How long a control-plane participant may go unheard from before its
    /// peer is declared offline.
    pub fn participant_liveliness_lease_duration(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 5 } else { 60 })
    }

    /// How often a participant asserts its own liveliness.
    pub fn participant_liveliness_assert_period(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 2 } else { 20 })
    }

    /// How often remote liveliness is checked.
    pub fn participant_liveliness_detection_period(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 6 } else { 30 })
    }

    /// Number of initial announcements sent at startup.
    pub fn initial_participant_announcements(self) -> u32 {
        60
    }

    /// `(min, max)` jitter window between initial announcements, in seconds.
    pub fn initial_participant_announcement_period(self) -> (u64, u64) {
        if self == Self::Fast {
            (1, 5)
        } else {
            (3, 15)
        }
    }

    pub fn ospf_dead_interval(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 5 } else { 60 })
    }

    pub fn ospf_hello_interval(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 1 } else { 15 })
    }

    pub fn ospf_retransmit_interval(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 2 } else { 5 })
    }

    /// `max_trigger_delay` for the reachability probe.
    pub fn tester_max_delay(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 30 } else { 3600 })
    }

    pub fn status_min_delay(self) -> Duration {
        Duration::from_secs(if self == Self::Fast { 10 } else { 30 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_profile_is_strictly_faster() {
        assert!(
            TimingProfile::Fast.participant_liveliness_lease_duration()
                < TimingProfile::Default.participant_liveliness_lease_duration()
        );
        assert!(TimingProfile::Fast.tester_max_delay() < TimingProfile::Default.tester_max_delay());
    }

    #[test]
    fn parse_accepts_hyphen_or_underscore() {
        assert_eq!(TimingProfile::parse("fast"), Some(TimingProfile::Fast));
        assert_eq!(TimingProfile::parse("Default"), Some(TimingProfile::Default));
        assert_eq!(TimingProfile::parse("bogus"), None);
    }
}
