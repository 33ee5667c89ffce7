//! Error taxonomy for the registry. Membership/deployment/vpnconfig errors
//! are re-exported unchanged (they already carry their own severity); the
//! remaining variants are this crate's own.

use std::time::Duration;

use shared_types::errors::{Classified, Severity};
use shared_types::ids::{CellId, ParticleId};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Membership(#[from] shared_types::uvn::UvnError),
    #[error(transparent)]
    KeyMaterial(#[from] uvn_02_keymaterial::KeyMaterialError),
    #[error(transparent)]
    Deployment(#[from] uvn_03_deployment::DeploymentError),
    #[error(transparent)]
    VpnConfig(#[from] uvn_04_vpnconfig::VpnConfigError),
    #[error("no backbone deployment has been generated yet; call redeploy() or save() first")]
    NoDeployment,
    #[error("root vpn is disabled in settings")]
    RootVpnDisabled,
    #[error("particles vpn is disabled in settings")]
    ParticlesVpnDisabled,
    #[error("cell {0} has no pending bundle to export; call save() first")]
    NoBundleFor(CellId),
    #[error("particle {0} has no pending package to export; call save() first")]
    NoPackageFor(ParticleId),
    #[error("failed to build bundle archive: {0}")]
    Archive(String),
    #[error("rekey spin timed out waiting for {0} consistency after {1:?}")]
    RekeySpinTimeout(&'static str, Duration),
    #[error("no rekey is currently in progress")]
    NoRekeyInProgress,
}

impl Classified for RegistryError {
    fn severity(&self) -> Severity {
        match self {
            Self::Membership(e) => e.severity(),
            Self::KeyMaterial(e) => e.severity(),
            Self::Deployment(e) => e.severity(),
            Self::VpnConfig(e) => e.severity(),
            Self::NoDeployment | Self::RootVpnDisabled | Self::ParticlesVpnDisabled => Severity::Configuration,
            Self::NoBundleFor(_) | Self::NoPackageFor(_) => Severity::Configuration,
            Self::Archive(_) => Severity::External,
            Self::RekeySpinTimeout(..) => Severity::Timeout,
            Self::NoRekeyInProgress => Severity::Consistency,
        }
    }
}
