//! Hot configuration reload (§5): when a `BACKBONE` sample targets this
//! cell with a newer `registry_id`, the agent decodes the new
//! configuration, validates it against the one currently running, tears
//! down and brings services back up under it, and rolls back to the
//! previous configuration if the new one fails to come up cleanly.

use shared_types::exec::CommandRunner;
use uvn_02_keymaterial::EciesPackage;
use uvn_10_controlplane::{BackbonePayload, BackboneSample};
use uvn_11_registry::bundle::AgentConfig;
use uvn_telemetry::metrics::AGENT_RELOADS;

use crate::bundle::AgentIdentity;
use crate::errors::AgentError;
use crate::runtime::Agent;

/// Applies one queued `BackboneSample`: decode, validate, swap, and
/// restart services. On failure, restores the previous configuration and
/// identity and restarts services under it before returning the original
/// error.
pub(crate) async fn apply<R: CommandRunner + Clone>(agent: &mut Agent<R>, sample: BackboneSample) -> Result<(), AgentError> {
    let (pending_config, pending_identity) = decode_payload(agent.identity(), &sample.payload)?;
    validate(agent.config(), &pending_config)?;

    let previous_config = agent.config().clone();
    let previous_identity = agent.identity().clone();

    agent.tear_down();
    agent.replace_config(pending_config, pending_identity);

    if let Err(e) = agent.bring_up() {
        tracing::error!(error = %e, "reload failed, rolling back to the previous configuration");
        agent.tear_down();
        agent.replace_config(previous_config, Some(previous_identity));

        return match agent.bring_up() {
            Ok(()) => {
                AGENT_RELOADS.with_label_values(&["rolled_back"]).inc();
                Err(e)
            }
            Err(rollback_err) => {
                AGENT_RELOADS.with_label_values(&["rolled_back"]).inc();
                Err(AgentError::RollbackFailed(rollback_err.to_string()))
            }
        };
    }

    AGENT_RELOADS.with_label_values(&["applied"]).inc();
    tracing::info!(registry_id = %sample.registry_id, "hot reload applied");
    Ok(())
}

/// Decodes a `BackboneSample` payload into the configuration it carries,
/// and — for a full bundle — the fresh identity that comes with it. A
/// legacy `EncryptedConfig` sample carries no new identity: the cell keeps
/// decrypting with the key it already holds.
fn decode_payload(identity: &AgentIdentity, payload: &BackbonePayload) -> Result<(AgentConfig, Option<AgentIdentity>), AgentError> {
    match payload {
        BackbonePayload::EncryptedConfig(encoded) => {
            let package: EciesPackage = serde_json::from_str(encoded).map_err(|e| AgentError::ConfigParse(e.to_string()))?;
            let plaintext = uvn_02_keymaterial::ecies::decrypt(&identity.cell_key_pem, &package)?;
            let config: AgentConfig = serde_yaml::from_slice(&plaintext).map_err(|e| AgentError::ConfigParse(e.to_string()))?;
            Ok((config, None))
        }
        BackbonePayload::SignedEncryptedPackage(bytes) => {
            let (config, identity) = crate::bundle::unpack_bundle(bytes)?;
            Ok((config, Some(identity)))
        }
    }
}

/// Rejects a pending configuration that targets a different UVN or cell
/// than the one currently running, or that would leave the agent with no
/// declared LANs it previously had. A reload is a configuration update,
/// not a re-enrollment — anything that looks like the latter is refused.
fn validate(current: &AgentConfig, pending: &AgentConfig) -> Result<(), AgentError> {
    if pending.uvn_name != current.uvn_name {
        return Err(AgentError::InvalidPendingConfig(format!(
            "pending config targets uvn '{}', agent belongs to '{}'",
            pending.uvn_name, current.uvn_name
        )));
    }
    if pending.cell_id != current.cell_id {
        return Err(AgentError::InvalidPendingConfig(format!(
            "pending config targets cell {}, agent is cell {}",
            pending.cell_id, current.cell_id
        )));
    }
    if pending.allowed_lans.is_empty() && !current.allowed_lans.is_empty() {
        return Err(AgentError::InvalidPendingConfig(
            "pending config drops every allowed_lan".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ids::{CellId, PeerId};
    use shared_types::settings::UvnSettings;
    use shared_types::timing::TimingProfile;
    use uvn_02_keymaterial::KeyMaterial;
    use uvn_03_deployment::PeerSlot;

    fn sample_config(uvn_name: &str, cell_id: CellId, allowed_lans: Vec<ipnetwork::Ipv4Network>) -> AgentConfig {
        AgentConfig {
            uvn_name: uvn_name.to_string(),
            registry_id: "gen-1".to_string(),
            cell_id,
            timing_profile: TimingProfile::Default,
            settings: UvnSettings::default(),
            allowed_lans,
            root_vpn: None,
            particles_vpn: None,
            backbone_vpn: vec![],
            backbone_slot: PeerSlot::default(),
        }
    }

    #[test]
    fn validate_rejects_a_different_uvn() {
        let current = sample_config("home", CellId::new(1), vec![]);
        let pending = sample_config("away", CellId::new(1), vec![]);
        let err = validate(&current, &pending).unwrap_err();
        assert!(matches!(err, AgentError::InvalidPendingConfig(_)));
    }

    #[test]
    fn validate_rejects_a_different_cell_id() {
        let current = sample_config("home", CellId::new(1), vec![]);
        let pending = sample_config("home", CellId::new(2), vec![]);
        let err = validate(&current, &pending).unwrap_err();
        assert!(matches!(err, AgentError::InvalidPendingConfig(_)));
    }

    #[test]
    fn validate_rejects_dropping_every_allowed_lan() {
        let current = sample_config("home", CellId::new(1), vec!["10.0.0.0/24".parse().unwrap()]);
        let pending = sample_config("home", CellId::new(1), vec![]);
        let err = validate(&current, &pending).unwrap_err();
        assert!(matches!(err, AgentError::InvalidPendingConfig(_)));
    }

    #[test]
    fn validate_accepts_a_matching_config_with_new_settings() {
        let current = sample_config("home", CellId::new(1), vec!["10.0.0.0/24".parse().unwrap()]);
        let mut pending = sample_config("home", CellId::new(1), vec!["10.0.0.0/24".parse().unwrap()]);
        pending.registry_id = "gen-2".to_string();
        assert!(validate(&current, &pending).is_ok());
    }

    #[test]
    fn decode_payload_round_trips_an_encrypted_config() {
        let mut keymat = KeyMaterial::init("uvn-home").unwrap();
        let id = CellId::new(1);
        keymat.assert_peer(PeerId::Cell(id), &["CELL_ID"], &["UVN_ID", "BACKBONE"]).unwrap();
        let (cert_pem, key_pem) = keymat.peer(PeerId::Cell(id)).unwrap().exported_identity();

        let config = sample_config("home", id, vec![]);
        let plaintext = serde_yaml::to_vec(&config).unwrap();
        let package = uvn_02_keymaterial::ecies::encrypt(&cert_pem, &plaintext).unwrap();
        let encoded = serde_json::to_string(&package).unwrap();

        let identity = AgentIdentity {
            cell_cert_pem: cert_pem,
            cell_key_pem: key_pem,
            identity_ca_cert_pem: keymat.identity_ca_cert().to_string(),
            permissions_ca_cert_pem: keymat.permissions_ca_cert().to_string(),
            governance_signed: keymat.governance_document().to_vec(),
        };

        let (decoded, carried_identity) = decode_payload(&identity, &BackbonePayload::EncryptedConfig(encoded)).unwrap();
        assert_eq!(decoded.cell_id, id);
        assert!(carried_identity.is_none());
    }
}
