//! Routing-daemon lifecycle and read-only queries (§4.7), grounded on the
//! reference `Router.generate_configuration`/`start`/`stop` plus its
//! `vtysh -c "show ..."` query helpers. Runs only on cell agents; the
//! registry never instantiates this driver.

use std::fs;
use std::path::{Path, PathBuf};

use shared_types::exec::{stderr_string, stdout_string, succeeded, CommandRunner};

use crate::config::RouterConfig;
use crate::errors::RouterError;

/// The read-only query surface exposed by the daemon's CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterQuery {
    Neighbors,
    Routes,
    Interfaces,
    Borders,
    Lsa,
    Summary,
}

impl RouterQuery {
    fn vtysh_command(self) -> &'static str {
        match self {
            Self::Neighbors => "show ip ospf neighbor",
            Self::Routes => "show ip route ospf",
            Self::Interfaces => "show ip ospf interface",
            Self::Borders => "show ip ospf border-routers",
            Self::Lsa => "show ip ospf database",
            Self::Summary => "show ip ospf",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Neighbors => "neighbors",
            Self::Routes => "routes",
            Self::Interfaces => "interfaces",
            Self::Borders => "borders",
            Self::Lsa => "lsa",
            Self::Summary => "summary",
        }
    }
}

/// A started routing daemon. Dropping this does not stop the daemon —
/// callers call [`RouterDriver::stop`] explicitly.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    pub config_path: PathBuf,
}

pub struct RouterDriver<R: CommandRunner> {
    runner: R,
    config_path: PathBuf,
}

impl<R: CommandRunner> RouterDriver<R> {
    pub fn new(runner: R, config_path: impl AsRef<Path>) -> Self {
        Self {
            runner,
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Writes `config`'s rendered text to the daemon's config file and
    /// asks the service supervisor to (re)start it.
    #[tracing::instrument(skip_all, fields(path = %self.config_path.display()))]
    pub fn start(&self, config: &RouterConfig) -> Result<RouterHandle, RouterError> {
        fs::write(&self.config_path, config.render())
            .map_err(|e| RouterError::ConfigWriteFailed(self.config_path.display().to_string(), e.to_string()))?;

        let out = self
            .runner
            .run("service", &["frr", "restart"])
            .map_err(|e| RouterError::StartFailed(e.to_string()))?;
        if !succeeded(&out) {
            return Err(RouterError::StartFailed(stderr_string(&out)));
        }

        tracing::info!("routing daemon started");
        Ok(RouterHandle {
            config_path: self.config_path.clone(),
        })
    }

    /// Stops the daemon. Best-effort: logs but does not abort on failure,
    /// matching the teardown convention of the tunnel and plane drivers.
    #[tracing::instrument(skip(self, _handle))]
    pub fn stop(&self, _handle: &RouterHandle) {
        match self.runner.run("service", &["frr", "stop"]) {
            Ok(out) if succeeded(&out) => tracing::info!("routing daemon stopped"),
            Ok(out) => tracing::warn!(error = %stderr_string(&out), "failed to stop routing daemon"),
            Err(e) => tracing::warn!(error = %e, "failed to stop routing daemon"),
        }
    }

    /// Runs one of the daemon's read-only queries via its CLI.
    #[tracing::instrument(skip(self))]
    pub fn query(&self, query: RouterQuery) -> Result<String, RouterError> {
        let out = self
            .runner
            .run("vtysh", &["-c", query.vtysh_command()])
            .map_err(|e| RouterError::QueryFailed(query.label().to_string(), e.to_string()))?;
        if !succeeded(&out) {
            return Err(RouterError::QueryFailed(query.label().to_string(), stderr_string(&out)));
        }
        Ok(stdout_string(&out))
    }
}
