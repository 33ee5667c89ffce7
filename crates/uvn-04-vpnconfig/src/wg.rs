//! WireGuard key material. Distinct from the identity CA material in
//! `uvn-02-keymaterial`: these are Curve25519 keys consumed only by the
//! tunnel driver, never signed by either CA and never part of a peer's
//! certificate.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

#[derive(Clone, Serialize, Deserialize)]
pub struct WgKeyPair {
    private_key: Zeroizing<String>,
    pub public_key: String,
}

impl std::fmt::Debug for WgKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgKeyPair").field("public_key", &self.public_key).finish()
    }
}

impl WgKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            private_key: Zeroizing::new(BASE64.encode(secret.to_bytes())),
            public_key: BASE64.encode(public.as_bytes()),
        }
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

/// A random 256-bit preshared key, base64-encoded as `wg genpsk` emits.
pub fn genpsk() -> String {
    let mut buf = [0u8; 32];
    OsRng.fill_bytes(&mut buf);
    BASE64.encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypairs_are_distinct() {
        let a = WgKeyPair::generate();
        let b = WgKeyPair::generate();
        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn psks_are_32_bytes_decoded() {
        let psk = genpsk();
        let decoded = BASE64.decode(psk).unwrap();
        assert_eq!(decoded.len(), 32);
    }
}
