use shared_types::errors::{Classified, Severity};
use shared_types::ids::PeerId;

#[derive(Debug, thiserror::Error)]
pub enum VpnConfigError {
    #[error("no wireguard key material has been asserted for peer {0}")]
    KeyNotAsserted(PeerId),
    #[error("no preshared key has been asserted for this pair")]
    PskNotAsserted,
    #[error("root vpn requires at least one peer")]
    NoPeers,
    #[error("base64 decoding of key material failed: {0}")]
    Encoding(String),
}

impl Classified for VpnConfigError {
    fn severity(&self) -> Severity {
        match self {
            Self::KeyNotAsserted(_) | Self::PskNotAsserted | Self::Encoding(_) => Severity::Identity,
            Self::NoPeers => Severity::Configuration,
        }
    }
}
