//! ICMP-echo reachability probing (§4.9), grounded on the reference
//! `UvnPeersTester.run`: for every remote LAN gateway, a handful of pings
//! decide reachable vs unreachable; a successful ping's route is also
//! queried for its next hop, cached for display purposes only.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use shared_types::exec::{stdout_string, succeeded, CommandRunner};
use shared_types::net::LanDescriptor;

use crate::errors::ProbeError;

const DEFAULT_ECHO_COUNT: u8 = 3;
const DEFAULT_TIMEOUT_SECS: u8 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub reachable: Vec<LanDescriptor>,
    pub unreachable: Vec<LanDescriptor>,
}

pub struct ReachabilityProbe<R: CommandRunner> {
    runner: R,
    echo_count: u8,
    timeout_secs: u8,
    next_hops: BTreeMap<Ipv4Addr, Ipv4Addr>,
}

impl<R: CommandRunner> ReachabilityProbe<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            echo_count: DEFAULT_ECHO_COUNT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            next_hops: BTreeMap::new(),
        }
    }

    fn ping(&self, gateway: Ipv4Addr) -> Result<bool, ProbeError> {
        let count = self.echo_count.to_string();
        let timeout = self.timeout_secs.to_string();
        let addr = gateway.to_string();
        let out = self
            .runner
            .run("ping", &["-c", &count, "-W", &timeout, &addr])
            .map_err(|e| ProbeError::PingFailed(addr.clone(), e.to_string()))?;
        Ok(succeeded(&out))
    }

    fn next_hop(&self, gateway: Ipv4Addr) -> Result<Option<Ipv4Addr>, ProbeError> {
        let addr = gateway.to_string();
        let out = self
            .runner
            .run("ip", &["route", "get", &addr])
            .map_err(|e| ProbeError::NextHopFailed(addr.clone(), e.to_string()))?;
        if !succeeded(&out) {
            return Ok(None);
        }
        Ok(parse_next_hop(&stdout_string(&out)))
    }

    /// Pings every LAN's gateway, partitions reachable vs unreachable, and
    /// caches the next hop of each gateway that answered.
    #[tracing::instrument(skip_all, fields(targets = targets.len()))]
    pub fn probe(&mut self, targets: &[LanDescriptor]) -> Result<ProbeResult, ProbeError> {
        let mut result = ProbeResult::default();
        for lan in targets {
            if self.ping(lan.gateway)? {
                if let Some(next_hop) = self.next_hop(lan.gateway)? {
                    self.next_hops.insert(lan.gateway, next_hop);
                }
                let mut reached = lan.clone();
                reached.next_hop = self.next_hops.get(&lan.gateway).copied();
                result.reachable.push(reached);
            } else {
                result.unreachable.push(lan.clone());
            }
        }
        tracing::info!(reachable = result.reachable.len(), unreachable = result.unreachable.len(), "probe complete");
        Ok(result)
    }

    pub fn cached_next_hop(&self, gateway: Ipv4Addr) -> Option<Ipv4Addr> {
        self.next_hops.get(&gateway).copied()
    }
}

fn parse_next_hop(output: &str) -> Option<Ipv4Addr> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "via" {
            return tokens.next().and_then(|s| s.parse().ok());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::exec::fake::{FakeCommandRunner, ScriptedOutput};
    use shared_types::net::NicDescriptor;

    fn lan(gateway: &str) -> LanDescriptor {
        LanDescriptor {
            nic: NicDescriptor::new("eth1"),
            gateway: gateway.parse().unwrap(),
            next_hop: None,
        }
    }

    #[test]
    fn reachable_gateway_is_partitioned_correctly_with_cached_next_hop() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::ok("")); // ping ok
        runner.push(ScriptedOutput::ok("192.168.1.1 via 10.0.0.1 dev uwg-b0")); // ip route get
        let mut probe = ReachabilityProbe::new(runner);
        let result = probe.probe(&[lan("192.168.1.1")]).unwrap();
        assert_eq!(result.reachable.len(), 1);
        assert!(result.unreachable.is_empty());
        assert_eq!(result.reachable[0].next_hop, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(probe.cached_next_hop("192.168.1.1".parse().unwrap()), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn unreachable_gateway_is_partitioned_without_next_hop_lookup() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::err("100% packet loss"));
        let mut probe = ReachabilityProbe::new(runner);
        let result = probe.probe(&[lan("192.168.1.1")]).unwrap();
        assert!(result.reachable.is_empty());
        assert_eq!(result.unreachable.len(), 1);
        assert_eq!(probe.runner.calls().len(), 1);
    }

    #[test]
    fn multiple_targets_are_each_probed_independently() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::ok(""));
        runner.push(ScriptedOutput::ok("via 10.0.0.1"));
        runner.push(ScriptedOutput::err("timeout"));
        let mut probe = ReachabilityProbe::new(runner);
        let result = probe.probe(&[lan("192.168.1.1"), lan("192.168.2.1")]).unwrap();
        assert_eq!(result.reachable.len(), 1);
        assert_eq!(result.unreachable.len(), 1);
    }
}
