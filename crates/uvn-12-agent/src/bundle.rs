//! Agent-side counterpart to `uvn_11_registry::bundle`: unpacks a cell
//! bundle tar.xz archive (§6) into its decrypted [`AgentConfig`] and the
//! identity material it carries. This is the one place the agent uses
//! `uvn_02_keymaterial::ecies` directly rather than through a
//! `KeyMaterial` — an agent never holds one (§3 Ownership), only its own
//! issued cert/key.

use std::io::Read as _;

use uvn_02_keymaterial::EciesPackage;
use uvn_11_registry::bundle::AgentConfig;

use crate::errors::AgentError;

/// The identity tree carried alongside every bundle: this cell's own
/// certificate/key plus the two CA certificates needed to verify peers
/// and the signed governance document. Never a CA private key.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub cell_cert_pem: String,
    pub cell_key_pem: String,
    pub identity_ca_cert_pem: String,
    pub permissions_ca_cert_pem: String,
    pub governance_signed: Vec<u8>,
}

/// Decompresses and untars `bundle`, decrypts `agent.yaml.enc` with the
/// cell's own private key (found in the same archive), and parses the
/// result into an [`AgentConfig`].
#[tracing::instrument(skip_all)]
pub fn unpack_bundle(bundle: &[u8]) -> Result<(AgentConfig, AgentIdentity), AgentError> {
    let entries = untar_xz(bundle)?;

    let cell_cert_pem = entry_string(&entries, "identity/cell.cert.pem")?;
    let cell_key_pem = entry_string(&entries, "identity/cell.key.pem")?;
    let identity_ca_cert_pem = entry_string(&entries, "identity/identity-ca.cert.pem")?;
    let permissions_ca_cert_pem = entry_string(&entries, "identity/permissions-ca.cert.pem")?;
    let governance_signed = entry_bytes(&entries, "identity/governance.signed")?.to_vec();

    let encrypted_json = entry_bytes(&entries, "agent.yaml.enc")?;
    let package: EciesPackage =
        serde_json::from_slice(encrypted_json).map_err(|e| AgentError::ConfigParse(e.to_string()))?;
    let plaintext = uvn_02_keymaterial::ecies::decrypt(&cell_key_pem, &package)?;
    let config: AgentConfig =
        serde_yaml::from_slice(&plaintext).map_err(|e| AgentError::ConfigParse(e.to_string()))?;

    let identity = AgentIdentity {
        cell_cert_pem,
        cell_key_pem,
        identity_ca_cert_pem,
        permissions_ca_cert_pem,
        governance_signed,
    };
    tracing::info!(cell_id = %config.cell_id, registry_id = %config.registry_id, "bundle unpacked");
    Ok((config, identity))
}

fn untar_xz(bundle: &[u8]) -> Result<Vec<(String, Vec<u8>)>, AgentError> {
    let mut decoder = xz2::read::XzDecoder::new(bundle);
    let mut tar_bytes = Vec::new();
    decoder.read_to_end(&mut tar_bytes).map_err(|e| AgentError::Archive(e.to_string()))?;

    let mut archive = tar::Archive::new(tar_bytes.as_slice());
    let mut entries = Vec::new();
    for entry in archive.entries().map_err(|e| AgentError::Archive(e.to_string()))? {
        let mut entry = entry.map_err(|e| AgentError::Archive(e.to_string()))?;
        let name = entry.path().map_err(|e| AgentError::Archive(e.to_string()))?.to_string_lossy().into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(|e| AgentError::Archive(e.to_string()))?;
        entries.push((name, content));
    }
    Ok(entries)
}

fn entry_bytes<'a>(entries: &'a [(String, Vec<u8>)], name: &str) -> Result<&'a [u8], AgentError> {
    entries
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, content)| content.as_slice())
        .ok_or_else(|| AgentError::Archive(format!("bundle is missing entry {name}")))
}

fn entry_string(entries: &[(String, Vec<u8>)], name: &str) -> Result<String, AgentError> {
    let bytes = entry_bytes(entries, name)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| AgentError::Archive(e.to_string()))
}
