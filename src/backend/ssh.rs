//! Remote transfer and activation over ssh

use super::SshOptions;
use crate::runner::{self, quote_path, shell_quote};
use crate::sudo;
use anyhow::bail;
use rollout::{Activator, ActivationMode, Error, Host, Result, Secret, SudoPassword, Transport};
use std::path::{Path, PathBuf};

/// System profile updated by `switch` and `boot`
const SYSTEM_PROFILE: &str = "/nix/var/nix/profiles/system";

pub struct SshTransport {
    ssh: SshOptions,
}

impl SshTransport {
    pub fn new(ssh: SshOptions) -> Self {
        Self { ssh }
    }

    fn push_args(&self, host: &Host, paths: &[PathBuf]) -> Vec<String> {
        let mut args = vec!["--to".to_string(), self.ssh.destination(host)];
        args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        args
    }

    /// Run a script as root on the host
    fn remote_sudo(
        &self,
        host: &Host,
        script: &str,
        password: &SudoPassword,
        capture: bool,
    ) -> anyhow::Result<()> {
        let command = sudo::wrap(script, password);
        let args = self.ssh.ssh_args(host, &command.command_line);
        let input = command.needs_stdin.then(|| password.as_str());

        let output = runner::run_with_input("ssh", &args, input, capture)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.trim().is_empty() {
                bail!("remote command exited with {}", output.status);
            }
            bail!("{}", stderr.trim());
        }
        Ok(())
    }

    fn copy_and_install(
        &self,
        host: &Host,
        password: &SudoPassword,
        secret: &Secret,
        source: &Path,
        remote_tmp: &str,
    ) -> anyhow::Result<()> {
        let scp_args = self.ssh.scp_args(host, source, remote_tmp);
        runner::run_capture("scp", &scp_args)?;
        self.remote_sudo(host, &install_script(remote_tmp, secret), password, true)
    }
}

impl Transport for SshTransport {
    fn push(&self, host: &Host, paths: &[PathBuf]) -> Result<()> {
        let args = self.push_args(host, paths);
        let sshopts = self.ssh.nix_sshopts();
        let env: Vec<(&str, &str)> = if sshopts.is_empty() {
            Vec::new()
        } else {
            vec![("NIX_SSHOPTS", sshopts.as_str())]
        };

        runner::run_checked_env("nix-copy-closure", &args, &env).map_err(|e| Error::Transfer {
            host: host.hostname().to_string(),
            message: format!("{e:#}"),
        })
    }

    fn upload_secret(
        &self,
        host: &Host,
        sudo_password: &SudoPassword,
        secret: &Secret,
        base_dir: &Path,
    ) -> Result<()> {
        let upload_error = |e: anyhow::Error| Error::Upload {
            host: host.hostname().to_string(),
            secret: secret.destination.display().to_string(),
            message: format!("{e:#}"),
        };

        let source = secret.resolve_source(base_dir);
        let remote_tmp = runner::run_capture("ssh", &self.ssh.ssh_args(host, "mktemp"))
            .map_err(upload_error)?;
        if remote_tmp.is_empty() {
            return Err(upload_error(anyhow::anyhow!("mktemp printed no path")));
        }

        let result = self.copy_and_install(host, sudo_password, secret, &source, &remote_tmp);
        if result.is_err() {
            let cleanup = format!("rm -f {}", shell_quote(&remote_tmp));
            runner::run_quiet("ssh", &self.ssh.ssh_args(host, &cleanup));
        }
        result.map_err(upload_error)
    }
}

impl Activator for SshTransport {
    fn activate(
        &self,
        host: &Host,
        system_path: &Path,
        mode: ActivationMode,
        sudo_password: &SudoPassword,
    ) -> Result<()> {
        let script = activation_script(system_path, mode);
        self.remote_sudo(host, &script, sudo_password, false)
            .map_err(|e| Error::Activation {
                host: host.hostname().to_string(),
                mode,
                message: format!("{e:#}"),
            })
    }
}

/// Root script moving an uploaded file into place
fn install_script(remote_tmp: &str, secret: &Secret) -> String {
    let tmp = shell_quote(remote_tmp);
    let destination = quote_path(&secret.destination);
    let dir = secret
        .destination
        .parent()
        .map_or_else(|| "/".to_string(), quote_path);

    format!(
        "mkdir -p {dir} && chown {owner} {tmp} && chmod {perms} {tmp} && mv -f {tmp} {destination}",
        owner = shell_quote(&secret.owner.to_string()),
        perms = shell_quote(&secret.permissions),
    )
}

fn activation_script(system_path: &Path, mode: ActivationMode) -> String {
    let system = quote_path(system_path);
    let switch = format!("{system}/bin/switch-to-configuration {}", mode.as_str());
    if mode.updates_profile() {
        format!("nix-env --profile {SYSTEM_PROFILE} --set {system} && {switch}")
    } else {
        switch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollout::Owner;

    const SYSTEM: &str = "/nix/store/abc-nixos-system-web01";

    #[test]
    fn test_activation_script_switch_updates_profile() {
        assert_eq!(
            activation_script(Path::new(SYSTEM), ActivationMode::Switch),
            format!(
                "nix-env --profile /nix/var/nix/profiles/system --set {SYSTEM} && {SYSTEM}/bin/switch-to-configuration switch"
            )
        );
        assert!(
            activation_script(Path::new(SYSTEM), ActivationMode::Boot).starts_with("nix-env")
        );
    }

    #[test]
    fn test_activation_script_test_and_dry_activate() {
        assert_eq!(
            activation_script(Path::new(SYSTEM), ActivationMode::Test),
            format!("{SYSTEM}/bin/switch-to-configuration test")
        );
        assert_eq!(
            activation_script(Path::new(SYSTEM), ActivationMode::DryActivate),
            format!("{SYSTEM}/bin/switch-to-configuration dry-activate")
        );
    }

    #[test]
    fn test_install_script() {
        let secret = Secret {
            source: PathBuf::from("db.pass"),
            destination: PathBuf::from("/var/secrets/db/pass"),
            owner: Owner {
                user: "postgres".into(),
                group: "postgres".into(),
            },
            permissions: "0440".into(),
        };
        assert_eq!(
            install_script("/tmp/tmp.Ab12", &secret),
            "mkdir -p /var/secrets/db && chown postgres:postgres /tmp/tmp.Ab12 && chmod 0440 /tmp/tmp.Ab12 && mv -f /tmp/tmp.Ab12 /var/secrets/db/pass"
        );
    }

    #[test]
    fn test_install_script_quotes_hostile_values() {
        let secret = Secret {
            source: PathBuf::from("x"),
            destination: PathBuf::from("/var/secrets/a b"),
            owner: Owner::default(),
            permissions: "0400; reboot".into(),
        };
        let script = install_script("/tmp/t", &secret);
        assert!(script.contains("chmod '0400; reboot' /tmp/t"));
        assert!(script.ends_with("'/var/secrets/a b'"));
    }

    #[test]
    fn test_push_args() {
        let transport = SshTransport::new(SshOptions::new(Some("deploy".into()), vec![]));
        let host = Host::new("web01", "web01.example.net");
        assert_eq!(
            transport.push_args(&host, &[PathBuf::from(SYSTEM)]),
            vec!["--to", "deploy@web01.example.net", SYSTEM]
        );
    }
}
