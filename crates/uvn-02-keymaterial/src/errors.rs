//! Error taxonomy for key material operations. Every variant here is
//! `Severity::Identity`: fatal to the operation, leaves the filesystem
//! unchanged.

use shared_types::errors::{Classified, Severity};
use shared_types::ids::PeerId;

#[derive(Debug, thiserror::Error)]
pub enum KeyMaterialError {
    #[error("certificate generation failed: {0}")]
    CertGeneration(String),
    #[error("no key material has been asserted for peer {0}")]
    PeerNotFound(PeerId),
    #[error("no preshared secret exists for this pair yet")]
    NoPresharedSecret,
    #[error("HMAC verification failed while decrypting")]
    HmacMismatch,
    #[error("elliptic-curve operation failed: {0}")]
    Ecc(String),
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("CA root keys are not available (registry-only operation attempted elsewhere)")]
    NoRootKeys,
    #[error("rekey scope does not match the operation called")]
    ScopeMismatch,
}

impl Classified for KeyMaterialError {
    fn severity(&self) -> Severity {
        Severity::Identity
    }
}
