//! Self-signed certificate authorities and per-peer certificate issuance.
//!
//! Two independent CAs are used, mirroring the reference `DdsKeysBackend`:
//! an **identity** CA that signs peer certificates (used for ECIES and for
//! `sign_file`/`verify_signature`), and a **permissions** CA that signs the
//! governance document and per-peer permissions grants. Both are 384-bit EC
//! (P-384), self-signed, with a long validity (5 years, matching the
//! reference's 1825-day CA lifetime).

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P384_SHA384,
};

use crate::errors::KeyMaterialError;

/// Subject name for a CA or a peer certificate, matching the reference
/// `/C=.../ST=.../L=.../O=.../CN=...` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSubject {
    pub org: String,
    pub cn: String,
    pub country: String,
    pub state: String,
    pub location: String,
}

impl CertificateSubject {
    pub fn new(org: impl Into<String>, cn: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            cn: cn.into(),
            country: "US".to_string(),
            state: "Denial".to_string(),
            location: "Springfield".to_string(),
        }
    }

    fn distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CountryName, self.country.as_str());
        dn.push(DnType::StateOrProvinceName, self.state.as_str());
        dn.push(DnType::LocalityName, self.location.as_str());
        dn.push(DnType::OrganizationName, self.org.as_str());
        dn.push(DnType::CommonName, self.cn.as_str());
        dn
    }
}

impl std::fmt::Display for CertificateSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/C={}/ST={}/L={}/O={}/CN={}",
            self.country, self.state, self.location, self.org, self.cn
        )
    }
}

/// A signed certificate plus the private key that backs it, both in PEM.
#[derive(Debug, Clone)]
pub struct CertifiedKey {
    pub subject: CertificateSubject,
    pub cert_pem: String,
    pub key_pem: String,
}

/// A self-signed root certificate authority.
///
/// Root keys never leave the registry host (§5) — nothing in this crate
/// transmits `key_pem` of a `CertificateAuthority` itself; only peer
/// certificates issued by it are handed out.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    pub subject: CertificateSubject,
    cert_pem: String,
    key_pem: String,
}

impl CertificateAuthority {
    /// Materializes a fresh, self-signed 384-bit EC CA with a 5-year
    /// validity window (the reference uses 1825 days).
    pub fn init(subject: CertificateSubject) -> Result<Self, KeyMaterialError> {
        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384)
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;

        let mut params = CertificateParams::new(Vec::<String>::new())
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;
        params.distinguished_name = subject.distinguished_name();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;

        Ok(Self {
            subject,
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Issues and signs a leaf certificate for `subject`, returning the
    /// signed cert and its freshly generated private key, both in PEM.
    pub fn issue(&self, subject: CertificateSubject) -> Result<CertifiedKey, KeyMaterialError> {
        let ca_key_pair = KeyPair::from_pem(&self.key_pem)
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;
        let ca_params = CertificateParams::from_ca_cert_pem(&self.cert_pem)
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;
        let ca_cert: Certificate = ca_params
            .self_signed(&ca_key_pair)
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;

        let leaf_key = KeyPair::generate_for(&PKCS_ECDSA_P384_SHA384)
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;
        let mut leaf_params = CertificateParams::new(Vec::<String>::new())
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;
        leaf_params.distinguished_name = subject.distinguished_name();

        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &ca_cert, &ca_key_pair)
            .map_err(|e| KeyMaterialError::CertGeneration(e.to_string()))?;

        Ok(CertifiedKey {
            subject,
            cert_pem: leaf_cert.pem(),
            key_pem: leaf_key.serialize_pem(),
        })
    }

    /// Signs arbitrary bytes with the CA's own key, producing a detached
    /// signature document. Used for the governance document and for
    /// per-peer permissions grants (both signed by the *permissions* CA
    /// instance, never the identity CA).
    pub fn sign_document(&self, content: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        crate::ecies::sign_bytes(&self.key_pem, content)
    }

    pub fn verify_document(&self, signed: &[u8]) -> Result<Vec<u8>, KeyMaterialError> {
        crate::ecies::verify_bytes(&self.cert_pem, signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_renders_reference_format() {
        let s = CertificateSubject::new("uvn-home", "cell-a");
        assert_eq!(
            s.to_string(),
            "/C=US/ST=Denial/L=Springfield/O=uvn-home/CN=cell-a"
        );
    }

    #[test]
    fn ca_init_produces_pem_material() {
        let ca = CertificateAuthority::init(CertificateSubject::new("uvn-home", "Identity CA"))
            .unwrap();
        assert!(ca.cert_pem().contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn ca_issues_leaf_cert() {
        let ca = CertificateAuthority::init(CertificateSubject::new("uvn-home", "Identity CA"))
            .unwrap();
        let leaf = ca.issue(CertificateSubject::new("uvn-home", "cell-a")).unwrap();
        assert!(leaf.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(leaf.key_pem.contains("BEGIN PRIVATE KEY") || leaf.key_pem.contains("BEGIN EC PRIVATE KEY"));
    }
}
