//! Concrete collaborators for the rollout core.
//!
//! - [`nix::NixBuilder`] evaluates the deployment and builds the artifact
//! - [`ssh::SshTransport`] copies closures and secrets, and activates
//! - [`health::NetworkHealthChecker`] runs command and HTTP checks
//! - [`vault::VaultService`] issues per-host Vault tokens

pub mod health;
pub mod nix;
pub mod ssh;
pub mod vault;

use crate::config::SshConfig;
use crate::runner::shell_quote;
use rollout::Host;
use std::path::Path;

/// Executables required before any work starts
pub const REQUIRED_COMMANDS: &[&str] = &[
    "nix-instantiate",
    "nix-build",
    "nix-copy-closure",
    "ssh",
    "scp",
];

/// How to reach hosts over ssh
#[derive(Debug, Clone, Default)]
pub struct SshOptions {
    user: Option<String>,
    extra: Vec<String>,
}

impl SshOptions {
    pub fn new(user: Option<String>, extra: Vec<String>) -> Self {
        Self { user, extra }
    }

    /// `[user@]target` for a host
    pub fn destination(&self, host: &Host) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", host.target_host),
            None => host.target_host.clone(),
        }
    }

    /// Arguments for `ssh` running `remote_command` on the host
    pub fn ssh_args(&self, host: &Host, remote_command: &str) -> Vec<String> {
        let mut args = self.extra.clone();
        args.push(self.destination(host));
        args.push(remote_command.to_string());
        args
    }

    /// Like [`Self::ssh_args`] with a connect timeout
    pub fn ssh_args_with_timeout(
        &self,
        host: &Host,
        remote_command: &str,
        timeout_secs: u64,
    ) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", timeout_secs.max(1)),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        args.extend(self.ssh_args(host, remote_command));
        args
    }

    /// Arguments for `scp` copying `local` to `remote` on the host
    pub fn scp_args(&self, host: &Host, local: &Path, remote: &str) -> Vec<String> {
        let mut args = self.extra.clone();
        args.push(local.to_string_lossy().into_owned());
        args.push(format!("{}:{remote}", self.destination(host)));
        args
    }

    /// Value for `NIX_SSHOPTS`
    pub fn nix_sshopts(&self) -> String {
        self.extra
            .iter()
            .map(|o| shell_quote(o))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&SshConfig> for SshOptions {
    fn from(config: &SshConfig) -> Self {
        Self::new(config.user.clone(), config.options.clone())
    }
}
