//! Local-routes observer: polls the kernel routing table (`ip route`) and
//! emits add/remove deltas relative to the previous snapshot, grounded on
//! `ipv4_list_routes`. The reachability probe (§4.9) treats a non-empty
//! delta as a trigger condition; this module only computes the delta, it
//! does not own the polling loop (that is the Agent's worker thread,
//! per §5's scheduling model).

use std::collections::BTreeSet;

use ipnetwork::Ipv4Network;
use shared_types::exec::{stderr_string, succeeded, CommandRunner};

use crate::errors::NetworkPlaneError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDelta {
    pub added: BTreeSet<Ipv4Network>,
    pub removed: BTreeSet<Ipv4Network>,
}

impl RouteDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct RouteObserver<R: CommandRunner> {
    runner: R,
    known: BTreeSet<Ipv4Network>,
}

impl<R: CommandRunner> RouteObserver<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            known: BTreeSet::new(),
        }
    }

    fn current_routes(&self) -> Result<BTreeSet<Ipv4Network>, NetworkPlaneError> {
        let out = self
            .runner
            .run("ip", &["-o", "route", "show"])
            .map_err(|e| NetworkPlaneError::RouteListFailed(e.to_string()))?;
        if !succeeded(&out) {
            return Err(NetworkPlaneError::RouteListFailed(stderr_string(&out)));
        }
        let text = shared_types::exec::stdout_string(&out);
        Ok(parse_routes(&text))
    }

    /// Polls the kernel table and returns what changed since the last
    /// poll, updating the internal snapshot in the process.
    #[tracing::instrument(skip(self))]
    pub fn poll(&mut self) -> Result<RouteDelta, NetworkPlaneError> {
        let current = self.current_routes()?;
        let added: BTreeSet<Ipv4Network> = current.difference(&self.known).copied().collect();
        let removed: BTreeSet<Ipv4Network> = self.known.difference(&current).copied().collect();
        self.known = current;
        if !added.is_empty() || !removed.is_empty() {
            tracing::debug!(added = added.len(), removed = removed.len(), "local routes changed");
        }
        Ok(RouteDelta { added, removed })
    }
}

fn parse_routes(text: &str) -> BTreeSet<Ipv4Network> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|token| *token != "default")
        .filter_map(|token| token.parse::<Ipv4Network>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::exec::fake::{FakeCommandRunner, ScriptedOutput};

    #[test]
    fn first_poll_reports_every_route_as_added() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::ok("192.168.1.0/24 dev uwg-p0 scope link\ndefault via 10.0.0.1 dev eth0\n"));
        let mut obs = RouteObserver::new(runner);
        let delta = obs.poll().unwrap();
        assert_eq!(delta.added.len(), 1);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn second_poll_with_same_routes_is_empty() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::ok("192.168.1.0/24 dev uwg-p0 scope link\n"));
        runner.push(ScriptedOutput::ok("192.168.1.0/24 dev uwg-p0 scope link\n"));
        let mut obs = RouteObserver::new(runner);
        obs.poll().unwrap();
        let delta = obs.poll().unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn route_removal_is_detected() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::ok("192.168.1.0/24 dev uwg-p0 scope link\n"));
        runner.push(ScriptedOutput::ok(""));
        let mut obs = RouteObserver::new(runner);
        obs.poll().unwrap();
        let delta = obs.poll().unwrap();
        assert_eq!(delta.removed.len(), 1);
    }
}
