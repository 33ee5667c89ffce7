//! Per-peer credential bundle: the triple `(cert, private_key,
//! signed_permissions_doc)` held for every registry/cell/particle peer.

use serde::{Deserialize, Serialize};
use shared_types::ids::PeerId;

use crate::ca::CertifiedKey;

/// Topic access-control rights granted to a peer's permissions document,
/// carried as opaque strings — the concrete topic name constants live in
/// `uvn-10-controlplane`, which is the only crate that needs to know what
/// `"UVN_ID"`/`"CELL_ID"`/`"BACKBONE"` mean.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicGrants {
    pub published: Vec<String>,
    pub subscribed: Vec<String>,
}

/// Credentials issued to one peer: its identity certificate and private
/// key, plus a permissions document signed by the permissions CA granting
/// the topic rights in `grants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerCredentials {
    pub id: PeerId,
    pub cert_pem: String,
    pub key_pem: String,
    pub grants: TopicGrants,
    /// Permissions document, signed by the permissions CA (opaque bytes;
    /// verified with `KeyMaterial::verify_permissions`).
    pub permissions_signed: Vec<u8>,
}

impl PeerCredentials {
    pub(crate) fn new(id: PeerId, issued: CertifiedKey, grants: TopicGrants, permissions_signed: Vec<u8>) -> Self {
        Self {
            id,
            cert_pem: issued.cert_pem,
            key_pem: issued.key_pem,
            grants,
            permissions_signed,
        }
    }

    /// The certificate and key only, i.e. what gets exported into a
    /// bundle's identity tree (§6) — never the CA root keys.
    pub fn exported_identity(&self) -> (&str, &str) {
        (&self.cert_pem, &self.key_pem)
    }
}
