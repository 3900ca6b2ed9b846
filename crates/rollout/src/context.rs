//! Collaborator traits
//!
//! The rollout core never shells out or talks to the network itself.
//! Building, transferring, activating, health checking and the secret
//! service are all injected through these traits.

use crate::error::{Error, Result};
use crate::select::Selection;
use crate::types::{ActivationMode, DynamicCredential, Host, Secret, SudoPassword};
use std::path::{Path, PathBuf};

/// Builds the deployment artifact and locates per-host outputs in it
pub trait Builder {
    /// Build every host's configuration into one artifact
    fn build(&self, hosts: &[Host]) -> Result<PathBuf>;

    /// Store paths that must be present on the host before activation
    fn paths_to_push(&self, host: &Host, artifact: &Path) -> Result<Vec<PathBuf>>;

    /// The host's system configuration inside the artifact
    fn system_path(&self, host: &Host, artifact: &Path) -> Result<PathBuf>;
}

/// Moves files to hosts
pub trait Transport {
    /// Copy store paths (with their closure) to the host
    fn push(&self, host: &Host, paths: &[PathBuf]) -> Result<()>;

    /// Deliver a secret with its declared owner and permissions
    fn upload_secret(
        &self,
        host: &Host,
        sudo_password: &SudoPassword,
        secret: &Secret,
        base_dir: &Path,
    ) -> Result<()>;
}

/// Switches a host to a new configuration
pub trait Activator {
    fn activate(
        &self,
        host: &Host,
        system_path: &Path,
        mode: ActivationMode,
        sudo_password: &SudoPassword,
    ) -> Result<()>;
}

/// Runs a host's configured health checks
pub trait HealthChecker {
    /// Returns `Error::HealthCheck` when checks do not pass within `timeout_secs`
    /// (`0` waits indefinitely)
    fn run_health_checks(&self, host: &Host, timeout_secs: u64) -> Result<()>;
}

/// Secret-management service issuing per-host credentials
pub trait SecretService {
    /// Authenticated handle, reused for the whole invocation
    type Session;

    fn authenticate(&self, address: &str, token: &str) -> Result<Self::Session>;

    /// One-time setup performed right after authenticating
    fn configure(&self, session: &Self::Session) -> Result<()>;

    /// Issue a fresh credential for the host, superseding the previous one
    fn rekey(&self, session: &Self::Session, host: &Host) -> Result<DynamicCredential>;
}

/// Progress callback for rollouts
///
/// Every method has a no-op default so implementors only override what
/// they display.
pub trait ProgressCallback {
    /// Called once the inventory has been narrowed
    fn on_selection(&mut self, _selection: &Selection) {}

    /// Called once the artifact is built
    fn on_build_complete(&mut self, _artifact: &Path) {}

    /// Called before pushing paths to a host
    fn on_push(&mut self, _host: &Host, _paths: &[PathBuf]) {}

    /// Called before a host's static secrets are uploaded
    fn on_secrets_start(&mut self, _host: &Host) {}

    /// Called before each secret upload
    fn on_secret_start(&mut self, _name: &str, _size: u64) {}

    /// Called after each secret upload attempt
    fn on_secret_complete(&mut self, _name: &str, _ok: bool) {}

    /// Called when a host's dynamic credential was rekeyed and delivered
    fn on_credential_rekeyed(&mut self, _host: &Host) {}

    /// Called before activating a host
    fn on_activate(&mut self, _host: &Host, _mode: ActivationMode) {}

    /// Called before running a host's health checks
    fn on_health_check_start(&mut self, _host: &Host) {}

    /// Called after a host's health checks
    fn on_health_check_complete(&mut self, _host: &Host, _result: &Result<()>) {}

    /// Called when a host reached the end of its steps
    fn on_host_done(&mut self, _host: &Host) {}

    /// Called for recoverable failures
    fn on_warning(&mut self, _error: &Error) {}
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {}
