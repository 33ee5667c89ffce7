//! # Key Material
//!
//! Identity lifecycle for a UVN (§4.3): two self-signed CAs (identity +
//! permissions), per-peer certificates and permissions grants, per-link
//! preshared secrets, and the ECIES sign/encrypt scheme used to seal
//! per-cell agent bundles. Owned exclusively by the registry (§3
//! Ownership) — an agent only ever holds its own `PeerCredentials` plus
//! the certificates needed to verify others, never a `KeyMaterial`.

pub mod ca;
pub mod ecies;
pub mod errors;
pub mod peer;
pub mod rekey;

pub use ecies::EciesPackage;
pub use errors::KeyMaterialError;
pub use peer::{PeerCredentials, TopicGrants};
pub use rekey::{Generation, RekeyScope};

use ca::{CertificateAuthority, CertificateSubject};
use rand::RngCore;
use std::collections::BTreeMap;
use uvn_01_paired_map::PairedValueMap;

use shared_types::ids::PeerId;

/// A 256-bit preshared secret for one backbone link or client channel.
pub type PresharedSecret = [u8; 32];

/// Root identity for a UVN: both CAs, the signed governance document, and
/// every peer's issued credentials and preshared secrets.
pub struct KeyMaterial {
    org: String,
    identity_ca: CertificateAuthority,
    permissions_ca: CertificateAuthority,
    /// Governance document, signed by the permissions CA.
    governance_signed: Vec<u8>,
    peers: BTreeMap<PeerId, PeerCredentials>,
    psk: PairedValueMap<PeerId, PresharedSecret>,
}

impl KeyMaterial {
    /// Materializes both CAs and the governance document. Matches the
    /// reference's `generate_key(KeyId.Type.ROOT)`.
    #[tracing::instrument(skip_all, fields(org = %org))]
    pub fn init(org: impl Into<String>) -> Result<Self, KeyMaterialError> {
        let org = org.into();
        let identity_ca =
            CertificateAuthority::init(CertificateSubject::new(&org, "Identity Certificate Authority"))?;
        let permissions_ca = CertificateAuthority::init(CertificateSubject::new(
            &org,
            "Permissions Certificate Authority",
        ))?;
        // The governance document has no variable content today; it is a
        // fixed grant of default rights, matching `dds/governance.xml`.
        let governance_signed = permissions_ca.sign_document(b"<governance/>")?;

        tracing::info!("key material initialized");
        Ok(Self {
            org,
            identity_ca,
            permissions_ca,
            governance_signed,
            peers: BTreeMap::new(),
            psk: PairedValueMap::new(),
        })
    }

    pub fn governance_document(&self) -> &[u8] {
        &self.governance_signed
    }

    /// Public certificate of the identity CA — never its private key —
    /// the trust anchor a peer's exported bundle needs to verify other
    /// peers' certificates.
    pub fn identity_ca_cert(&self) -> &str {
        self.identity_ca.cert_pem()
    }

    pub fn permissions_ca_cert(&self) -> &str {
        self.permissions_ca.cert_pem()
    }

    pub fn verify_governance(&self) -> Result<Vec<u8>, KeyMaterialError> {
        self.permissions_ca.verify_document(&self.governance_signed)
    }

    /// Creates (or returns the existing) credentials for `id`: an EC key
    /// and CSR signed by the identity CA, plus a permissions document
    /// granting `published`/`subscribed` topic rights, signed by the
    /// permissions CA. Matches `KeysBackend._assert_peer`.
    #[tracing::instrument(skip(self, published_topics, subscribed_topics), fields(peer = %id))]
    pub fn assert_peer(
        &mut self,
        id: PeerId,
        published_topics: &[&str],
        subscribed_topics: &[&str],
    ) -> Result<&PeerCredentials, KeyMaterialError> {
        if !self.peers.contains_key(&id) {
            let subject = CertificateSubject::new(&self.org, &id.to_string());
            let issued = self.identity_ca.issue(subject)?;

            let grants = TopicGrants {
                published: published_topics.iter().map(|s| s.to_string()).collect(),
                subscribed: subscribed_topics.iter().map(|s| s.to_string()).collect(),
            };
            let permissions_doc = render_permissions_xml(id, &grants);
            let permissions_signed = self.permissions_ca.sign_document(permissions_doc.as_bytes())?;

            tracing::info!("issued peer credentials");
            self.peers
                .insert(id, PeerCredentials::new(id, issued, grants, permissions_signed));
        }
        self.peers.get(&id).ok_or(KeyMaterialError::PeerNotFound(id))
    }

    pub fn peer(&self, id: PeerId) -> Result<&PeerCredentials, KeyMaterialError> {
        self.peers.get(&id).ok_or(KeyMaterialError::PeerNotFound(id))
    }

    /// Returns the preshared secret for `(a, b)`, generating a fresh
    /// random one on first assertion. Retained across redeployments
    /// unless an explicit scoped `drop_keys` request purges it first.
    pub fn assert_link_secret(&mut self, a: PeerId, b: PeerId) -> PresharedSecret {
        *self.psk.assert_with(a, b, || {
            let mut secret = [0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut secret);
            secret
        })
    }

    pub fn link_secret(&self, a: PeerId, b: PeerId) -> Result<PresharedSecret, KeyMaterialError> {
        self.psk.get(a, b).copied().map_err(|_| KeyMaterialError::NoPresharedSecret)
    }

    /// Signs `content` with `signer`'s own private key.
    pub fn sign_file(&self, signer: PeerId, content: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        let cred = self.peer(signer)?;
        ecies::sign_bytes(&cred.key_pem, content)
    }

    pub fn verify_signature(&self, signer: PeerId, signed: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        let cred = self.peer(signer)?;
        ecies::verify_bytes(&cred.cert_pem, signed)
    }

    /// Encrypts `content` to `recipient`'s certificate.
    pub fn encrypt_file(&self, recipient: PeerId, content: &[u8]) -> Result<EciesPackage, KeyMaterialError> {
        let cred = self.peer(recipient)?;
        ecies::encrypt(&cred.cert_pem, content)
    }

    pub fn decrypt_file(
        &self,
        recipient: PeerId,
        package: &EciesPackage,
    ) -> Result<zeroize::Zeroizing<Vec<u8>>, KeyMaterialError> {
        let cred = self.peer(recipient)?;
        ecies::decrypt(&cred.key_pem, package)
    }

    /// Re-issues a cell's identity (new cert/key, new permissions doc).
    /// The link secrets it participates in are untouched unless
    /// `drop_keys` is true.
    pub fn rekey_cell(&mut self, scope: rekey::RekeyScope) -> Result<(), KeyMaterialError> {
        let RekeyScope::Cell(cell_id) = scope else {
            return Err(KeyMaterialError::ScopeMismatch);
        };
        self.reissue(shared_types::ids::PeerId::Cell(cell_id))
    }

    pub fn rekey_particle(&mut self, id: shared_types::ids::ParticleId) -> Result<(), KeyMaterialError> {
        self.reissue(shared_types::ids::PeerId::Particle(id))
    }

    /// Rekeys the whole UVN: every peer's identity is re-issued. Scoped
    /// `drop_keys_*` flags additionally purge the preshared secrets for
    /// the named profile's peers, forcing fresh ones on next assertion.
    pub fn rekey_uvn(&mut self, scope: rekey::RekeyScope) -> Result<(), KeyMaterialError> {
        let RekeyScope::Uvn {
            drop_keys_root_vpn,
            drop_keys_particles_vpn,
            ..
        } = scope
        else {
            return Err(KeyMaterialError::ScopeMismatch);
        };
        let ids: Vec<PeerId> = self.peers.keys().copied().collect();
        for id in ids {
            self.reissue(id)?;
        }
        if drop_keys_root_vpn || drop_keys_particles_vpn {
            let ids: Vec<PeerId> = self.peers.keys().copied().collect();
            for id in ids {
                self.psk.purge(id);
            }
        }
        Ok(())
    }

    fn reissue(&mut self, id: PeerId) -> Result<(), KeyMaterialError> {
        let existing = self.peers.get(&id).ok_or(KeyMaterialError::PeerNotFound(id))?;
        let grants = existing.grants.clone();
        let published: Vec<&str> = grants.published.iter().map(String::as_str).collect();
        let subscribed: Vec<&str> = grants.subscribed.iter().map(String::as_str).collect();
        self.peers.remove(&id);
        self.assert_peer(id, &published, &subscribed)?;
        Ok(())
    }
}

fn render_permissions_xml(id: PeerId, grants: &TopicGrants) -> String {
    let published = grants.published.join(",");
    let subscribed = grants.subscribed.join(",");
    format!(
        "<permissions peer=\"{id}\"><published>{published}</published><subscribed>{subscribed}</subscribed></permissions>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ids::CellId;

    #[test]
    fn assert_peer_is_idempotent() {
        let mut km = KeyMaterial::init("uvn-home").unwrap();
        let id = PeerId::Cell(CellId::new(1));
        let first = km.assert_peer(id, &["CELL_ID"], &["UVN_ID", "BACKBONE"]).unwrap().cert_pem.clone();
        let second = km.assert_peer(id, &["CELL_ID"], &["UVN_ID", "BACKBONE"]).unwrap().cert_pem.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn link_secret_is_retained_across_repeated_assertion() {
        let mut km = KeyMaterial::init("uvn-home").unwrap();
        let a = PeerId::Cell(CellId::new(1));
        let b = PeerId::Cell(CellId::new(2));
        let s1 = km.assert_link_secret(a, b);
        let s2 = km.assert_link_secret(b, a);
        assert_eq!(s1, s2);
    }

    #[test]
    fn encrypt_to_peer_then_decrypt_with_its_key_round_trips() {
        let mut km = KeyMaterial::init("uvn-home").unwrap();
        let cell = PeerId::Cell(CellId::new(1));
        km.assert_peer(cell, &["CELL_ID"], &["UVN_ID", "BACKBONE"]).unwrap();

        let package = km.encrypt_file(cell, b"agent config").unwrap();
        let plaintext = km.decrypt_file(cell, &package).unwrap();
        assert_eq!(&plaintext[..], b"agent config");
    }

    #[test]
    fn rekey_cell_changes_its_certificate_but_keeps_link_secrets() {
        let mut km = KeyMaterial::init("uvn-home").unwrap();
        let a = PeerId::Cell(CellId::new(1));
        let b = PeerId::Cell(CellId::new(2));
        km.assert_peer(a, &["CELL_ID"], &["UVN_ID", "BACKBONE"]).unwrap();
        km.assert_peer(b, &["CELL_ID"], &["UVN_ID", "BACKBONE"]).unwrap();
        let secret_before = km.assert_link_secret(a, b);
        let cert_before = km.peer(a).unwrap().cert_pem.clone();

        km.rekey_cell(RekeyScope::Cell(CellId::new(1))).unwrap();

        assert_ne!(km.peer(a).unwrap().cert_pem, cert_before);
        assert_eq!(km.link_secret(a, b).unwrap(), secret_before);
    }

    #[test]
    fn governance_document_verifies() {
        let km = KeyMaterial::init("uvn-home").unwrap();
        let content = km.verify_governance().unwrap();
        assert_eq!(content, b"<governance/>");
    }
}
