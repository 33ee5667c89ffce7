//! Mutual-exclusion PID file (§4.6): before bringing up the network plane,
//! the agent claims a filesystem-scoped PID file. If another process
//! holding that file is still alive, startup is refused; a stale file
//! left behind by a crashed process is cleaned up automatically. The file
//! is written on successful startup and removed on shutdown.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::NetworkPlaneError;

/// Held for the lifetime of a running agent. Dropping it does not remove
/// the file — callers call [`PidFile::release`] explicitly so the error
/// path (release failed) is visible, matching this crate's "callers
/// revert explicitly" convention.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claims `path` for the current process. Fails with
    /// [`NetworkPlaneError::AlreadyRunning`] if the file names a PID that
    /// is still alive; a file naming a dead PID is cleaned up and claimed.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn claim(path: impl AsRef<Path>) -> Result<Self, NetworkPlaneError> {
        let path = path.as_ref().to_path_buf();
        if let Some(existing) = read_pid(&path)? {
            if process_alive(existing) {
                return Err(NetworkPlaneError::AlreadyRunning(existing));
            }
            tracing::warn!(pid = existing, "removing stale pid file");
        }
        let pid = std::process::id();
        fs::write(&path, pid.to_string()).map_err(|e| NetworkPlaneError::PidFileFailed(path.display().to_string(), e.to_string()))?;
        tracing::info!(pid, "claimed pid file");
        Ok(Self { path })
    }

    /// Removes the PID file. Idempotent: a missing file is not an error.
    pub fn release(self) -> Result<(), NetworkPlaneError> {
        match fs::remove_file(&self.path) {
            Ok(()) | Err(_) if !self.path.exists() => Ok(()),
            Err(e) => Err(NetworkPlaneError::PidFileFailed(self.path.display().to_string(), e.to_string())),
        }
    }
}

fn read_pid(path: &Path) -> Result<Option<u32>, NetworkPlaneError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(NetworkPlaneError::PidFileFailed(path.display().to_string(), e.to_string())),
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(pid: u32) -> bool {
    // Best-effort outside Linux: signal 0 just probes for existence/perms.
    unsafe { libc_kill_probe(pid) }
}

#[cfg(not(target_os = "linux"))]
fn libc_kill_probe(_pid: u32) -> bool {
    // No libc dependency is carried by this workspace; treat as unknown
    // (conservatively "alive") rather than clobbering another process.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_then_release_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        let pidfile = PidFile::claim(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), std::process::id().to_string());
        pidfile.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn stale_pid_file_is_cleaned_up_and_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        // A PID essentially guaranteed not to be alive.
        fs::write(&path, "4000000000").unwrap();
        let pidfile = PidFile::claim(&path).unwrap();
        pidfile.release().unwrap();
    }

    #[test]
    fn live_pid_refuses_to_be_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        fs::write(&path, std::process::id().to_string()).unwrap();
        let err = PidFile::claim(&path).unwrap_err();
        assert!(matches!(err, NetworkPlaneError::AlreadyRunning(_)));
    }

    #[test]
    fn release_is_idempotent_if_file_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.pid");
        let pidfile = PidFile::claim(&path).unwrap();
        fs::remove_file(&path).unwrap();
        pidfile.release().unwrap();
    }
}
