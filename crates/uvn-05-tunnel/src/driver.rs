//! WireGuard tunnel interface lifecycle (§4.5), grounded on the reference
//! `WireGuardInterface.create/bring_up/tear_down/delete` sequence: `ip
//! link` manages the interface, `wg setconf` programs keys and peers from
//! a config file written with owner-only permissions.

use std::collections::BTreeSet;
use std::io::Write;

use ipnetwork::Ipv4Network;
use shared_types::exec::{stderr_string, succeeded, CommandRunner};

use crate::errors::TunnelError;
use crate::stats::{self, PeerStat};
use uvn_04_vpnconfig::TunnelConfig;

/// A started tunnel interface. Dropping this does not tear the interface
/// down — callers must call [`TunnelDriver::stop`] explicitly, matching
/// §4.5's "callers must invoke `stop` to revert partial state".
#[derive(Debug, Clone)]
pub struct TunnelHandle {
    pub interface_name: String,
}

pub struct TunnelDriver<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> TunnelDriver<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn ip(&self, args: &[&str]) -> Result<String, String> {
        match self.runner.run("ip", args) {
            Ok(out) if succeeded(&out) => Ok(shared_types::exec::stdout_string(&out)),
            Ok(out) => Err(stderr_string(&out)),
            Err(e) => Err(e.to_string()),
        }
    }

    fn wg(&self, args: &[&str]) -> Result<String, String> {
        match self.runner.run("wg", args) {
            Ok(out) if succeeded(&out) => Ok(shared_types::exec::stdout_string(&out)),
            Ok(out) => Err(stderr_string(&out)),
            Err(e) => Err(e.to_string()),
        }
    }

    fn interface_exists(&self, name: &str) -> bool {
        matches!(self.runner.run("ip", &["link", "show", name]), Ok(out) if succeeded(&out))
    }

    /// If `name` already exists, delete it; create a fresh interface, set
    /// its MTU, flush any stale addresses, assign the configured address,
    /// program peers via `wg setconf`, and bring it up. Any failure is
    /// propagated and the caller must call `stop` to revert partial state.
    #[tracing::instrument(skip_all, fields(interface = %config.interface_name))]
    pub fn start(&self, config: &TunnelConfig) -> Result<TunnelHandle, TunnelError> {
        let name = &config.interface_name;

        if self.interface_exists(name) {
            self.ip(&["link", "delete", "dev", name])
                .map_err(|e| TunnelError::DeleteFailed(name.clone(), e))?;
        }

        self.ip(&["link", "add", "dev", name, "type", "wireguard"])
            .map_err(|e| TunnelError::CreateFailed(name.clone(), e))?;

        self.ip(&["link", "set", "dev", name, "mtu", &config.mtu.to_string()])
            .map_err(|e| TunnelError::SetMtuFailed(name.clone(), e))?;

        self.ip(&["address", "flush", "dev", name])
            .map_err(|e| TunnelError::FlushAddressFailed(name.clone(), e))?;

        self.ip(&["address", "add", &config.address.to_string(), "dev", name])
            .map_err(|e| TunnelError::SetAddressFailed(name.clone(), e))?;

        self.apply_wg_config(config).map_err(|e| TunnelError::WgSetFailed(name.clone(), e))?;

        self.ip(&["link", "set", "up", "dev", name])
            .map_err(|e| TunnelError::BringUpFailed(name.clone(), e))?;

        tracing::info!("tunnel interface started");
        Ok(TunnelHandle {
            interface_name: name.clone(),
        })
    }

    fn apply_wg_config(&self, config: &TunnelConfig) -> Result<(), String> {
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("{}-", config.interface_name))
            .suffix("-wgconf")
            .tempfile()
            .map_err(|e| e.to_string())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tmp.as_file().metadata().map_err(|e| e.to_string())?.permissions();
            perms.set_mode(0o600);
            tmp.as_file().set_permissions(perms).map_err(|e| e.to_string())?;
        }
        write!(tmp, "{}", render_wg_config(config)).map_err(|e| e.to_string())?;
        let path = tmp.path().to_string_lossy().into_owned();
        self.wg(&["setconf", &config.interface_name, &path]).map(|_| ())
    }

    /// Reverses `start`: tears the interface down regardless of whether
    /// every step of `start` actually completed, logging but not aborting
    /// on individual failures (it may run during cleanup of a partially
    /// initialized state).
    #[tracing::instrument(skip(self))]
    pub fn stop(&self, handle: &TunnelHandle) {
        if let Err(e) = self.ip(&["link", "delete", "dev", &handle.interface_name]) {
            tracing::warn!(interface = %handle.interface_name, error = %e, "failed to delete tunnel interface");
        }
    }

    /// Diffs the currently programmed allowed-IPs for `peer_public_key`
    /// against `desired` and applies only the delta — the fast path for
    /// announcing newly routed LANs at runtime without a full reconfigure.
    #[tracing::instrument(skip(self, desired), fields(interface, peer_public_key))]
    pub fn set_allowed_ips(
        &self,
        interface: &str,
        peer_public_key: &str,
        desired: &[Ipv4Network],
    ) -> Result<(), TunnelError> {
        let current = self.stat(interface)?;
        let current_ips: BTreeSet<Ipv4Network> = current
            .iter()
            .find(|p| p.public_key == peer_public_key)
            .map(|p| p.allowed_ips.iter().copied().collect())
            .unwrap_or_default();
        let desired_ips: BTreeSet<Ipv4Network> = desired.iter().copied().collect();

        if current_ips == desired_ips {
            return Ok(());
        }

        let joined = desired.iter().map(Ipv4Network::to_string).collect::<Vec<_>>().join(",");
        self.wg(&["set", interface, "peer", peer_public_key, "allowed-ips", &joined])
            .map_err(|e| TunnelError::WgSetFailed(interface.to_string(), e))?;
        tracing::info!(added = desired_ips.difference(&current_ips).count(), removed = current_ips.difference(&desired_ips).count(), "allowed-ips updated");
        Ok(())
    }

    /// Per-peer `{last_handshake, rx, tx, endpoint, allowed_ips}` with the
    /// §4.5 liveness flag (`now - last_handshake < 150s`).
    pub fn stat(&self, interface: &str) -> Result<Vec<PeerStat>, TunnelError> {
        let dump = self
            .wg(&["show", interface, "dump"])
            .map_err(|e| TunnelError::StatFailed(interface.to_string(), e))?;
        stats::parse_dump(interface, &dump)
    }
}

fn render_wg_config(config: &TunnelConfig) -> String {
    let mut out = String::new();
    out.push_str("[Interface]\n");
    out.push_str(&format!("PrivateKey = {}\n", config.private_key));
    if let Some(port) = config.listen_port {
        out.push_str(&format!("ListenPort = {port}\n"));
    }
    for peer in &config.peers {
        out.push_str("\n[Peer]\n");
        out.push_str(&format!("PublicKey = {}\n", peer.public_key));
        out.push_str(&format!("PresharedKey = {}\n", peer.preshared_key));
        if let Some(endpoint) = peer.endpoint {
            out.push_str(&format!("Endpoint = {endpoint}\n"));
        }
        let allowed = peer.allowed_ips.iter().map(Ipv4Network::to_string).collect::<Vec<_>>().join(", ");
        out.push_str(&format!("AllowedIPs = {allowed}\n"));
        if let Some(keepalive) = peer.persistent_keepalive {
            out.push_str(&format!("PersistentKeepalive = {keepalive}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::exec::fake::{FakeCommandRunner, ScriptedOutput};
    use std::net::Ipv4Addr;
    use uvn_04_vpnconfig::PeerEntry;

    fn config() -> TunnelConfig {
        TunnelConfig {
            interface_name: "uwg-b0".to_string(),
            private_key: "privkey".to_string(),
            address: Ipv4Network::new(Ipv4Addr::new(10, 255, 192, 0), 31).unwrap(),
            listen_port: Some(63449),
            mtu: 1320,
            peers: vec![PeerEntry {
                public_key: "peerkey".to_string(),
                preshared_key: "psk".to_string(),
                endpoint: None,
                allowed_ips: vec!["192.168.1.0/24".parse().unwrap()],
                persistent_keepalive: Some(25),
            }],
        }
    }

    #[test]
    fn start_deletes_existing_interface_before_recreating() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::ok("")); // ip link show -> exists
        let driver = TunnelDriver::new(runner);
        let handle = driver.start(&config()).unwrap();
        assert_eq!(handle.interface_name, "uwg-b0");
        let calls = driver_calls(&driver);
        assert!(calls.iter().any(|(p, a)| p == "ip" && a.first().map(String::as_str) == Some("link") && a.get(1).map(String::as_str) == Some("delete")));
    }

    fn driver_calls(driver: &TunnelDriver<FakeCommandRunner>) -> Vec<(String, Vec<String>)> {
        driver.runner.calls()
    }

    #[test]
    fn start_fails_fast_on_create_failure() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::err("no such device")); // link show -> not found
        runner.push(ScriptedOutput::err("permission denied")); // link add -> fails
        let driver = TunnelDriver::new(runner);
        let err = driver.start(&config()).unwrap_err();
        assert!(matches!(err, TunnelError::CreateFailed(_, _)));
    }

    #[test]
    fn set_allowed_ips_is_a_noop_when_unchanged() {
        let runner = FakeCommandRunner::new();
        let now = chrono::Utc::now().timestamp();
        let dump = format!("priv\tpub\t0\toff\npeerkey\tpsk\t(none)\t192.168.1.0/24\t{now}\t0\t0\t0\n");
        runner.push(ScriptedOutput::ok(dump));
        let driver = TunnelDriver::new(runner);
        driver
            .set_allowed_ips("uwg-b0", "peerkey", &["192.168.1.0/24".parse().unwrap()])
            .unwrap();
        assert!(!driver.runner.calls().iter().any(|(_, a)| a.first().map(String::as_str) == Some("set")));
    }

    #[test]
    fn set_allowed_ips_applies_delta_when_changed() {
        let runner = FakeCommandRunner::new();
        let dump = "priv\tpub\t0\toff\npeerkey\tpsk\t(none)\t192.168.1.0/24\t0\t0\t0\t0\n";
        runner.push(ScriptedOutput::ok(dump));
        runner.push(ScriptedOutput::ok(""));
        let driver = TunnelDriver::new(runner);
        driver
            .set_allowed_ips("uwg-b0", "peerkey", &["192.168.2.0/24".parse().unwrap()])
            .unwrap();
        let calls = driver.runner.calls();
        assert!(calls.iter().any(|(p, a)| p == "wg" && a.first().map(String::as_str) == Some("set")));
    }
}
