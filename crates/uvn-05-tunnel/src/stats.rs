//! Parses `wg show <intf> dump` output into per-peer liveness snapshots.
//!
//! Dump format (tab-separated, one line per record): the first line
//! describes the interface itself (`private-key public-key listen-port
//! fwmark`); every following line is one peer (`public-key preshared-key
//! endpoint allowed-ips latest-handshake rx tx keepalive`).

use std::net::SocketAddrV4;

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;

use crate::errors::TunnelError;

/// How long after the last handshake a peer is still considered online
/// (§4.5).
pub const LIVENESS_WINDOW_SECS: i64 = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct PeerStat {
    pub public_key: String,
    pub endpoint: Option<SocketAddrV4>,
    pub allowed_ips: Vec<Ipv4Network>,
    pub last_handshake: Option<DateTime<Utc>>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub online: bool,
}

pub fn parse_dump(interface: &str, dump: &str) -> Result<Vec<PeerStat>, TunnelError> {
    let now = Utc::now();
    let mut peers = Vec::new();
    for (i, line) in dump.lines().enumerate() {
        if i == 0 {
            // interface summary line, nothing to extract here
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            return Err(TunnelError::StatParseFailed(interface.to_string()));
        }
        let public_key = fields[0].to_string();
        let endpoint = if fields[2] == "(none)" {
            None
        } else {
            fields[2].parse().ok()
        };
        let allowed_ips = if fields[3].is_empty() || fields[3] == "(none)" {
            Vec::new()
        } else {
            fields[3]
                .split(',')
                .filter_map(|s| s.trim().parse::<Ipv4Network>().ok())
                .collect()
        };
        let handshake_epoch: i64 = fields[4].parse().unwrap_or(0);
        let last_handshake = if handshake_epoch > 0 {
            DateTime::from_timestamp(handshake_epoch, 0)
        } else {
            None
        };
        let rx_bytes: u64 = fields[5].parse().unwrap_or(0);
        let tx_bytes: u64 = fields[6].parse().unwrap_or(0);
        let online = last_handshake
            .map(|hs| (now - hs).num_seconds() < LIVENESS_WINDOW_SECS)
            .unwrap_or(false);

        peers.push(PeerStat {
            public_key,
            endpoint,
            allowed_ips,
            last_handshake,
            rx_bytes,
            tx_bytes,
            online,
        });
    }
    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_handshake_is_online() {
        let now = Utc::now().timestamp();
        let dump = format!(
            "privkey\tpubkey\t51820\toff\npeerkey\tpsk\t1.2.3.4:51820\t10.0.0.0/31\t{now}\t100\t200\t0\n"
        );
        let peers = parse_dump("uwg-b0", &dump).unwrap();
        assert_eq!(peers.len(), 1);
        assert!(peers[0].online);
        assert_eq!(peers[0].rx_bytes, 100);
    }

    #[test]
    fn stale_handshake_is_offline() {
        let stale = Utc::now().timestamp() - 10_000;
        let dump = format!("privkey\tpubkey\t51820\toff\npeerkey\tpsk\t(none)\t10.0.0.0/31\t{stale}\t0\t0\t0\n");
        let peers = parse_dump("uwg-b0", &dump).unwrap();
        assert!(!peers[0].online);
        assert!(peers[0].endpoint.is_none());
    }

    #[test]
    fn never_handshaked_peer_has_no_timestamp_and_is_offline() {
        let dump = "privkey\tpubkey\t51820\toff\npeerkey\tpsk\t(none)\t(none)\t0\t0\t0\t0\n";
        let peers = parse_dump("uwg-b0", dump).unwrap();
        assert!(peers[0].last_handshake.is_none());
        assert!(!peers[0].online);
        assert!(peers[0].allowed_ips.is_empty());
    }
}
