//! Per-cell agent bundle and per-particle client package (§6): a tar
//! archive, xz-compressed, holding a YAML configuration file and the
//! exported identity tree. The agent config file is additionally
//! ECIES-encrypted to the recipient's own certificate before being placed
//! in the archive, so the archive itself carries no readable secret
//! beyond what the target cell can already decrypt with its own key.

use std::io::Write;

use serde::{Deserialize, Serialize};

use ipnetwork::Ipv4Network;
use shared_types::ids::{CellId, ParticleId, PeerId};
use shared_types::settings::UvnSettings;
use shared_types::timing::TimingProfile;
use uvn_02_keymaterial::KeyMaterial;
use uvn_03_deployment::PeerSlot;
use uvn_04_vpnconfig::TunnelConfig;

use crate::errors::RegistryError;

/// Everything a cell agent needs to start without contacting the registry
/// again: its own tunnel configs, its slot in the backbone deployment, and
/// the settings it applies locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub uvn_name: String,
    pub registry_id: String,
    pub cell_id: CellId,
    pub timing_profile: TimingProfile,
    pub settings: UvnSettings,
    /// This cell's own declared LANs, carried so the agent can confirm its
    /// host's interfaces actually cover them before bringing up tunnels
    /// (§4.11 startup check) without contacting the registry again.
    pub allowed_lans: Vec<Ipv4Network>,
    pub root_vpn: Option<TunnelConfig>,
    pub particles_vpn: Option<TunnelConfig>,
    pub backbone_vpn: Vec<TunnelConfig>,
    pub backbone_slot: PeerSlot,
}

/// A particle only ever gets a WireGuard client config plus its identity —
/// never an `AgentConfig` — since it has no tunnels, router, or
/// control-plane participation of its own (it just dials in, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticlePackage {
    pub uvn_name: String,
    pub registry_id: String,
    pub particle_id: ParticleId,
    pub particles_vpn: TunnelConfig,
}

/// Builds the tar.xz archive for a cell: the ECIES-encrypted `AgentConfig`
/// plus the cell's exported `(cert, key)` pair and both CA certificates
/// (never CA private keys, §3 Ownership).
pub fn build_cell_bundle(keymat: &KeyMaterial, cell_id: CellId, config: &AgentConfig) -> Result<Vec<u8>, RegistryError> {
    let peer = PeerId::Cell(cell_id);
    let plaintext = serde_yaml::to_vec(config).map_err(|e| RegistryError::Archive(e.to_string()))?;
    let encrypted = keymat.encrypt_file(peer, &plaintext)?;
    let encrypted_json = serde_json::to_vec(&encrypted).map_err(|e| RegistryError::Archive(e.to_string()))?;

    let (cert_pem, key_pem) = keymat.peer(peer)?.exported_identity();
    archive(&[
        ("agent.yaml.enc", encrypted_json.as_slice()),
        ("identity/cell.cert.pem", cert_pem.as_bytes()),
        ("identity/cell.key.pem", key_pem.as_bytes()),
        ("identity/identity-ca.cert.pem", keymat.identity_ca_cert().as_bytes()),
        ("identity/permissions-ca.cert.pem", keymat.permissions_ca_cert().as_bytes()),
        ("identity/governance.signed", keymat.governance_document()),
    ])
}

/// Builds the client package for a particle: its WireGuard config in the
/// clear (a particle has no private key of its own to decrypt a sealed
/// config with, unlike a cell) plus its issued identity.
pub fn build_particle_package(
    keymat: &KeyMaterial,
    particle_id: ParticleId,
    package: &ParticlePackage,
) -> Result<Vec<u8>, RegistryError> {
    let peer = PeerId::Particle(particle_id);
    let plaintext = serde_yaml::to_vec(package).map_err(|e| RegistryError::Archive(e.to_string()))?;
    let (cert_pem, key_pem) = keymat.peer(peer)?.exported_identity();
    archive(&[
        ("particle.yaml", plaintext.as_slice()),
        ("identity/particle.cert.pem", cert_pem.as_bytes()),
        ("identity/particle.key.pem", key_pem.as_bytes()),
        ("identity/identity-ca.cert.pem", keymat.identity_ca_cert().as_bytes()),
    ])
}

fn archive(entries: &[(&str, &[u8])]) -> Result<Vec<u8>, RegistryError> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o600);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *content)
            .map_err(|e| RegistryError::Archive(e.to_string()))?;
    }
    let tar_bytes = builder.into_inner().map_err(|e| RegistryError::Archive(e.to_string()))?;

    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(&tar_bytes).map_err(|e| RegistryError::Archive(e.to_string()))?;
    encoder.finish().map_err(|e| RegistryError::Archive(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ids::CellId;

    #[test]
    fn cell_bundle_contains_identity_tree_and_encrypted_config() {
        let mut keymat = KeyMaterial::init("uvn-home").unwrap();
        let id = CellId::new(1);
        keymat.assert_peer(PeerId::Cell(id), &["CELL_ID"], &["UVN_ID", "BACKBONE"]).unwrap();

        let config = AgentConfig {
            uvn_name: "home".to_string(),
            registry_id: "gen-1".to_string(),
            cell_id: id,
            timing_profile: TimingProfile::Default,
            settings: UvnSettings::default(),
            allowed_lans: vec![],
            root_vpn: None,
            particles_vpn: None,
            backbone_vpn: vec![],
            backbone_slot: PeerSlot::default(),
        };
        let bundle = build_cell_bundle(&keymat, id, &config).unwrap();
        assert!(!bundle.is_empty());

        let decompressed = {
            let mut decoder = xz2::read::XzDecoder::new(bundle.as_slice());
            let mut out = Vec::new();
            std::io::Read::read_to_end(&mut decoder, &mut out).unwrap();
            out
        };
        let mut archive = tar::Archive::new(decompressed.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"agent.yaml.enc".to_string()));
        assert!(names.contains(&"identity/cell.cert.pem".to_string()));
    }
}
