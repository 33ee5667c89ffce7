//! ECIES-style hybrid sign/encrypt scheme (§4.3).
//!
//! `encrypt_file`/`decrypt_file`: derive a shared secret from a fresh
//! ephemeral EC key and the recipient's certificate public key (ECDH on
//! P-384), expand it with HKDF-SHA256 into an AES-256-GCM key and a
//! separate HMAC-SHA256 key, and emit `{ciphertext, ephemeral_pubkey,
//! hmac}`. Decryption recomputes the same shared secret from the
//! recipient's private key and the carried ephemeral public key, and
//! fails closed if the HMAC does not match before ever touching AES-GCM.
//!
//! `sign_file`/`verify_signature`: plain ECDSA over P-384/SHA-384 with the
//! signer's own key, matching the reference's `openssl smime -sign`
//! detached-signature step that always precedes encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use elliptic_curve::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use elliptic_curve::sec1::ToEncodedPoint;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use p384::ecdsa::signature::{Signer, Verifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use p384::{PublicKey, SecretKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::KeyMaterialError;

type HmacSha256 = Hmac<Sha256>;

const AES_KEY_INFO: &[u8] = b"uvn-keymaterial/aes256-gcm";
const HMAC_KEY_INFO: &[u8] = b"uvn-keymaterial/hmac-sha256";

/// The output of [`encrypt`]: everything the recipient needs to recover
/// the plaintext, except their own private key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EciesPackage {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; 12],
    /// SEC1-encoded (uncompressed) ephemeral public key point.
    pub ephemeral_pubkey: Vec<u8>,
    pub hmac: Vec<u8>,
}

fn public_key_from_cert_pem(cert_pem: &str) -> Result<PublicKey, KeyMaterialError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(cert_pem.as_bytes())
        .map_err(|e| KeyMaterialError::Ecc(e.to_string()))?;
    let cert = pem
        .parse_x509()
        .map_err(|e| KeyMaterialError::Ecc(e.to_string()))?;
    let spki_der = cert.tbs_certificate.subject_pki.raw;
    PublicKey::from_public_key_der(spki_der).map_err(|e| KeyMaterialError::Ecc(e.to_string()))
}

fn secret_key_from_pem(key_pem: &str) -> Result<SecretKey, KeyMaterialError> {
    SecretKey::from_pkcs8_pem(key_pem).map_err(|e| KeyMaterialError::Ecc(e.to_string()))
}

fn derive_keys(shared: &elliptic_curve::ecdh::SharedSecret<p384::NistP384>) -> ([u8; 32], [u8; 32]) {
    let hkdf = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes());
    let mut aes_key = [0u8; 32];
    let mut hmac_key = [0u8; 32];
    hkdf.expand(AES_KEY_INFO, &mut aes_key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    hkdf.expand(HMAC_KEY_INFO, &mut hmac_key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    (aes_key, hmac_key)
}

/// Encrypts `plaintext` to the holder of `recipient_cert_pem`'s private key.
pub fn encrypt(recipient_cert_pem: &str, plaintext: &[u8]) -> Result<EciesPackage, KeyMaterialError> {
    let recipient_pk = public_key_from_cert_pem(recipient_cert_pem)?;

    let ephemeral = elliptic_curve::ecdh::EphemeralSecret::<p384::NistP384>::random(&mut rand::rngs::OsRng);
    let ephemeral_pubkey = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&recipient_pk);
    let (aes_key, hmac_key) = derive_keys(&shared);

    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&aes_key).expect("32-byte key");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| KeyMaterialError::Ecc(e.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(&hmac_key).expect("32-byte key");
    mac.update(&ciphertext);
    let hmac = mac.finalize().into_bytes().to_vec();

    Ok(EciesPackage {
        ciphertext,
        nonce: nonce_bytes,
        ephemeral_pubkey: ephemeral_pubkey.to_encoded_point(false).as_bytes().to_vec(),
        hmac,
    })
}

/// Decrypts a package produced by [`encrypt`] using the recipient's own
/// private key (PEM). Fails with [`KeyMaterialError::HmacMismatch`] before
/// attempting AES-GCM decryption if the HMAC does not verify, so a
/// bit-flipped ciphertext is always rejected rather than silently
/// producing garbage plaintext.
pub fn decrypt(recipient_key_pem: &str, package: &EciesPackage) -> Result<Zeroizing<Vec<u8>>, KeyMaterialError> {
    let secret = secret_key_from_pem(recipient_key_pem)?;
    let ephemeral_pubkey = PublicKey::from_sec1_bytes(&package.ephemeral_pubkey)
        .map_err(|e| KeyMaterialError::Ecc(e.to_string()))?;

    let shared = elliptic_curve::ecdh::diffie_hellman(
        secret.to_nonzero_scalar(),
        ephemeral_pubkey.as_affine(),
    );
    let (aes_key, hmac_key) = derive_keys(&shared);

    let mut mac = HmacSha256::new_from_slice(&hmac_key).expect("32-byte key");
    mac.update(&package.ciphertext);
    mac.verify_slice(&package.hmac)
        .map_err(|_| KeyMaterialError::HmacMismatch)?;

    let cipher = Aes256Gcm::new_from_slice(&aes_key).expect("32-byte key");
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&package.nonce), package.ciphertext.as_ref())
        .map_err(|_| KeyMaterialError::HmacMismatch)?;

    Ok(Zeroizing::new(plaintext))
}

/// Signs `content` with `signer_key_pem` (ECDSA P-384/SHA-384). The
/// reference always signs before encrypting; this is the first half of
/// `KeyMaterial::sign_file`/`encrypt_file`.
pub fn sign_bytes(signer_key_pem: &str, content: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
    let secret = secret_key_from_pem(signer_key_pem)?;
    let signing_key = SigningKey::from(secret);
    let signature: Signature = signing_key.sign(content);

    #[derive(Serialize)]
    struct Signed<'a> {
        content: &'a [u8],
        signature: Vec<u8>,
    }
    serde_json::to_vec(&Signed {
        content,
        signature: signature.to_der().as_bytes().to_vec(),
    })
    .map_err(|e| KeyMaterialError::Ecc(e.to_string()))
}

/// Verifies a document produced by [`sign_bytes`] against `signer_cert_pem`,
/// returning the original content on success.
pub fn verify_bytes(signer_cert_pem: &str, signed: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
    #[derive(Deserialize)]
    struct Signed {
        content: Vec<u8>,
        signature: Vec<u8>,
    }
    let parsed: Signed =
        serde_json::from_slice(signed).map_err(|e| KeyMaterialError::Ecc(e.to_string()))?;

    let public_key = public_key_from_cert_pem(signer_cert_pem)?;
    let verifying_key = VerifyingKey::from(public_key);
    let signature = Signature::from_der(&parsed.signature)
        .map_err(|e| KeyMaterialError::Ecc(e.to_string()))?;

    verifying_key
        .verify(&parsed.content, &signature)
        .map_err(|_| KeyMaterialError::SignatureInvalid)?;

    Ok(parsed.content)
}
