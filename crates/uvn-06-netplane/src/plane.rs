//! Kernel forwarding, NAT masquerade and TCP-MSS clamp rules (§4.6),
//! grounded on the reference `ipv4_enable_forward`/`ipv4_enable_output_nat`/
//! `iptables_tcp_pmtu`/`iptables_docker_forward` helpers. `start` is fatal
//! on any failure; `stop` is best-effort and reverses every rule it
//! installed, logging per-rule failures instead of aborting, since it may
//! run during cleanup of a partially initialized state.

use shared_types::exec::{stderr_string, succeeded, CommandRunner};

use crate::errors::NetworkPlaneError;

/// One tunnel interface's desired plane treatment, mirroring the
/// `masquerade`/`forward` flags of a `VpnSettings` profile.
#[derive(Debug, Clone, Copy)]
pub struct InterfacePlane<'a> {
    pub interface: &'a str,
    pub masquerade: bool,
    pub forward: bool,
}

#[derive(Debug, Default)]
struct PlaneState {
    forwarding_enabled: bool,
    masqueraded: Vec<String>,
    forwarded: Vec<String>,
    mss_clamp: bool,
    docker_pairs: Vec<(String, String)>,
}

pub struct NetworkPlane<R: CommandRunner> {
    runner: R,
    state: PlaneState,
}

impl<R: CommandRunner> NetworkPlane<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            state: PlaneState::default(),
        }
    }

    fn iptables(&self, args: &[&str]) -> Result<(), String> {
        match self.runner.run("iptables", args) {
            Ok(out) if succeeded(&out) => Ok(()),
            Ok(out) => Err(stderr_string(&out)),
            Err(e) => Err(e.to_string()),
        }
    }

    /// `echo 1 > /proc/sys/net/ipv4/ip_forward`, matching
    /// `ipv4_enable_kernel_forwarding`.
    #[tracing::instrument(skip(self))]
    pub fn enable_forwarding(&mut self) -> Result<(), NetworkPlaneError> {
        self.runner
            .run("sysctl", &["-w", "net.ipv4.ip_forward=1"])
            .map_err(|e| NetworkPlaneError::ForwardingFailed(e.to_string()))
            .and_then(|out| {
                if succeeded(&out) {
                    self.state.forwarding_enabled = true;
                    Ok(())
                } else {
                    Err(NetworkPlaneError::ForwardingFailed(stderr_string(&out)))
                }
            })
    }

    fn enable_masquerade_rule(&self, iface: &str) -> Result<(), String> {
        self.iptables(&["-t", "nat", "-A", "POSTROUTING", "-o", iface, "-j", "MASQUERADE"])
    }

    fn disable_masquerade_rule(&self, iface: &str) -> Result<(), String> {
        self.iptables(&["-t", "nat", "-D", "POSTROUTING", "-o", iface, "-j", "MASQUERADE"])
    }

    fn enable_forward_rule(&self, iface: &str) -> Result<(), String> {
        self.iptables(&["-A", "FORWARD", "-i", iface, "-j", "ACCEPT"])?;
        self.iptables(&[
            "-A", "FORWARD", "-i", iface, "-m", "state", "--state", "ESTABLISHED,RELATED", "-j", "ACCEPT",
        ])
    }

    fn disable_forward_rule(&self, iface: &str) -> Result<(), String> {
        self.iptables(&["-D", "FORWARD", "-i", iface, "-j", "ACCEPT"])?;
        self.iptables(&[
            "-D", "FORWARD", "-i", iface, "-m", "state", "--state", "ESTABLISHED,RELATED", "-j", "ACCEPT",
        ])
    }

    fn enable_tcp_mss_clamp(&self) -> Result<(), String> {
        self.iptables(&[
            "-A", "FORWARD", "-p", "tcp", "--tcp-flags", "SYN,RST", "SYN", "-j", "TCPMSS", "--clamp-mss-to-pmtu",
        ])
    }

    fn disable_tcp_mss_clamp(&self) -> Result<(), String> {
        self.iptables(&[
            "-D", "FORWARD", "-p", "tcp", "--tcp-flags", "SYN,RST", "SYN", "-j", "TCPMSS", "--clamp-mss-to-pmtu",
        ])
    }

    /// True if a `DOCKER-USER` chain is present, i.e. a container-network
    /// firewall is managing this host.
    pub fn detect_docker(&self) -> bool {
        matches!(
            self.runner.run("iptables", &["-n", "--list", "DOCKER-USER"]),
            Ok(out) if succeeded(&out)
        )
    }

    fn enable_docker_forward(&self, a: &str, b: &str) -> Result<(), String> {
        self.iptables(&["-I", "DOCKER-USER", "-i", a, "-o", b, "-j", "ACCEPT"])
    }

    fn disable_docker_forward(&self, a: &str, b: &str) -> Result<(), String> {
        self.iptables(&["-D", "DOCKER-USER", "-i", a, "-o", b, "-j", "ACCEPT"])
    }

    /// Enables forwarding, installs masquerade/forward rules for every
    /// interface that asks for them, clamps TCP MSS on forward, and — if a
    /// container-network firewall is detected — inserts explicit
    /// inter-interface forwarding rules in its user chain for every pair
    /// of the given interfaces.
    #[tracing::instrument(skip(self, interfaces))]
    pub fn start(&mut self, interfaces: &[InterfacePlane<'_>]) -> Result<(), NetworkPlaneError> {
        self.enable_forwarding()?;

        for plane in interfaces {
            if plane.masquerade {
                self.enable_masquerade_rule(plane.interface)
                    .map_err(|e| NetworkPlaneError::MasqueradeFailed(plane.interface.to_string(), e))?;
                self.state.masqueraded.push(plane.interface.to_string());
            }
            if plane.forward {
                self.enable_forward_rule(plane.interface)
                    .map_err(|e| NetworkPlaneError::MasqueradeFailed(plane.interface.to_string(), e))?;
                self.state.forwarded.push(plane.interface.to_string());
            }
        }

        self.enable_tcp_mss_clamp().map_err(NetworkPlaneError::MssClampFailed)?;
        self.state.mss_clamp = true;

        if self.detect_docker() {
            tracing::warn!("docker detected, installing explicit DOCKER-USER forwarding rules");
            let names: Vec<&str> = interfaces.iter().map(|p| p.interface).collect();
            for i in 0..names.len() {
                for j in (i + 1)..names.len() {
                    self.enable_docker_forward(names[i], names[j])
                        .map_err(|e| NetworkPlaneError::DockerForwardFailed(names[i].into(), names[j].into(), e))?;
                    self.enable_docker_forward(names[j], names[i])
                        .map_err(|e| NetworkPlaneError::DockerForwardFailed(names[j].into(), names[i].into(), e))?;
                    self.state.docker_pairs.push((names[i].to_string(), names[j].to_string()));
                }
            }
        }

        tracing::info!("network plane started");
        Ok(())
    }

    /// Reverses every rule this plane installed. Never aborts: logs and
    /// continues so a single stubborn rule doesn't leave the rest in place.
    #[tracing::instrument(skip(self))]
    pub fn stop(&mut self) {
        for (a, b) in self.state.docker_pairs.drain(..) {
            if let Err(e) = self.disable_docker_forward(&a, &b) {
                tracing::warn!(a = %a, b = %b, error = %e, "failed to remove docker forward rule");
            }
        }
        if self.state.mss_clamp {
            self.state.mss_clamp = false;
            if let Err(e) = self.disable_tcp_mss_clamp() {
                tracing::warn!(error = %e, "failed to remove tcp-mss clamp rule");
            }
        }
        for iface in self.state.forwarded.drain(..) {
            if let Err(e) = self.disable_forward_rule(&iface) {
                tracing::warn!(interface = %iface, error = %e, "failed to remove forward rule");
            }
        }
        for iface in self.state.masqueraded.drain(..) {
            if let Err(e) = self.disable_masquerade_rule(&iface) {
                tracing::warn!(interface = %iface, error = %e, "failed to remove masquerade rule");
            }
        }
    }
}
