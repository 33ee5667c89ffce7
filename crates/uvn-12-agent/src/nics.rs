//! Local network interface detection (§4.11 startup check): before an
//! agent brings up its tunnels it must confirm the interfaces actually
//! present on the host cover every LAN its cell declares in
//! `allowed_lans`. Neither the registry nor any existing driver crate
//! needs this — only the agent, at the one moment it decides whether its
//! own host matches what the registry was told about it.

use ipnetwork::Ipv4Network;
use shared_types::exec::{stdout_string, succeeded, CommandRunner};
use shared_types::ids::CellId;
use shared_types::net::NicDescriptor;

use crate::errors::AgentError;

/// Runs `ip -o -4 addr show` and parses one [`NicDescriptor`] per reported
/// address line. Interfaces with no IPv4 address (or multiple) are
/// represented as one descriptor per address line, matching what `ip`
/// itself reports.
pub fn detect_local_nics<R: CommandRunner>(runner: &R) -> Result<Vec<NicDescriptor>, AgentError> {
    let out = runner
        .run("ip", &["-o", "-4", "addr", "show"])
        .map_err(|e| AgentError::NicDetectionFailed(e.to_string()))?;
    if !succeeded(&out) {
        return Err(AgentError::NicDetectionFailed(shared_types::exec::stderr_string(&out)));
    }
    Ok(parse_addr_show(&stdout_string(&out)))
}

fn parse_addr_show(output: &str) -> Vec<NicDescriptor> {
    let mut nics = Vec::new();
    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        let Some(_index) = tokens.next() else { continue };
        let Some(name) = tokens.next() else { continue };
        let mut tokens = tokens.peekable();
        while let Some(token) = tokens.next() {
            if token == "inet" {
                if let Some(cidr) = tokens.next() {
                    if let Ok(net) = cidr.parse::<Ipv4Network>() {
                        nics.push(NicDescriptor {
                            name: name.trim_end_matches(':').to_string(),
                            address: Some(net.ip()),
                            subnet: Some(Ipv4Network::new(net.network(), net.prefix()).expect("valid prefix")),
                        });
                    }
                }
            }
        }
    }
    nics
}

/// Confirms every network in `allowed_lans` is exactly the subnet of at
/// least one detected interface. Returns the first uncovered LAN as an
/// error; startup is refused rather than proceeding with an interface set
/// the registry doesn't know about.
pub fn validate_lan_coverage(cell_id: CellId, nics: &[NicDescriptor], allowed_lans: &[Ipv4Network]) -> Result<(), AgentError> {
    for lan in allowed_lans {
        let covered = nics.iter().any(|nic| nic.subnet == Some(*lan));
        if !covered {
            return Err(AgentError::LanNotCovered(cell_id, *lan));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::exec::fake::{FakeCommandRunner, ScriptedOutput};

    #[test]
    fn parses_inet_lines_into_descriptors() {
        let output = "1: lo    inet 127.0.0.1/8 scope host lo\n\
                       2: eth0    inet 192.168.1.5/24 brd 192.168.1.255 scope global eth0\n";
        let nics = parse_addr_show(output);
        assert_eq!(nics.len(), 2);
        assert_eq!(nics[1].name, "eth0");
        assert_eq!(nics[1].subnet, Some("192.168.1.0/24".parse().unwrap()));
    }

    #[test]
    fn detect_local_nics_runs_ip_addr_show() {
        let runner = FakeCommandRunner::new();
        runner.push(ScriptedOutput::ok("2: eth0    inet 10.0.0.2/24 scope global eth0\n"));
        let nics = detect_local_nics(&runner).unwrap();
        assert_eq!(nics.len(), 1);
        assert_eq!(nics[0].name, "eth0");
    }

    #[test]
    fn coverage_passes_when_subnet_matches_exactly() {
        let nics = vec![NicDescriptor {
            name: "eth0".to_string(),
            address: Some("192.168.1.5".parse().unwrap()),
            subnet: Some("192.168.1.0/24".parse().unwrap()),
        }];
        let allowed = vec!["192.168.1.0/24".parse().unwrap()];
        assert!(validate_lan_coverage(CellId::new(1), &nics, &allowed).is_ok());
    }

    #[test]
    fn coverage_fails_when_no_nic_matches() {
        let nics: Vec<NicDescriptor> = vec![];
        let allowed = vec!["192.168.1.0/24".parse().unwrap()];
        let err = validate_lan_coverage(CellId::new(1), &nics, &allowed).unwrap_err();
        assert!(matches!(err, AgentError::LanNotCovered(_, _)));
    }
}
