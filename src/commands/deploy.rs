use anyhow::Result;
use rollout::{ActivationMode, Collaborators, DeployOptions, RolloutOutcome};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::Context;
use crate::assets::Scratch;
use crate::backend::SshOptions;
use crate::backend::health::NetworkHealthChecker;
use crate::backend::ssh::SshTransport;
use crate::backend::vault::VaultService;
use crate::cli::DeployArgs;
use crate::progress::ConsoleProgress;
use crate::sudo;
use crate::ui;

use super::EXIT_UNHEALTHY;

pub fn run(ctx: &Context, args: &DeployArgs) -> Result<ExitCode> {
    super::ensure_tools()?;

    let scratch = Scratch::create()?;
    let deployment = super::deployment_path(&args.deployment)?;
    let secrets_base_dir = super::secrets_base_dir(&args.deployment)?;
    let opts = deploy_options(ctx, args, secrets_base_dir, scratch.path());
    let builder = super::nix_builder(&ctx.config, &scratch, deployment);

    let mut progress = ConsoleProgress::new();
    let hosts = super::select_hosts(&builder, &args.selection, &mut progress)?;
    if hosts.is_empty() {
        ui::warn("No hosts selected, only building");
    }

    let ssh = SshOptions::from(&ctx.config.ssh);
    let transport = SshTransport::new(ssh.clone());
    let health = NetworkHealthChecker::new(ssh);
    let collaborators = Collaborators {
        builder: &builder,
        transport: &transport,
        activator: &transport,
        health: &health,
        secret_service: &VaultService,
    };

    let outcome = rollout::deploy(
        &hosts,
        &opts,
        &collaborators,
        sudo::prompt_password,
        &mut progress,
    )?;

    println!();
    match outcome {
        RolloutOutcome::Completed { deployed } => {
            ui::success(&summary(&opts, deployed.len()));
            if progress.warnings() > 0 && !ctx.quiet {
                ui::warn(&format!(
                    "Finished with {}",
                    ui::plural(progress.warnings(), "warning", "warnings")
                ));
            }
            Ok(ExitCode::SUCCESS)
        }
        RolloutOutcome::Halted {
            host,
            error,
            deployed,
        } => {
            ui::error(&format!(
                "Not deploying to additional hosts, since a host health check failed on {host}"
            ));
            ui::dim(&error.to_string());
            if !deployed.is_empty() {
                ui::info(&format!("Completed before halting: {}", deployed.join(", ")));
            }
            Ok(ExitCode::from(EXIT_UNHEALTHY))
        }
    }
}

fn deploy_options(
    ctx: &Context,
    args: &DeployArgs,
    secrets_base_dir: PathBuf,
    scratch_dir: &Path,
) -> DeployOptions {
    DeployOptions {
        mode: args.mode.into(),
        dry_run: args.dry_run,
        ask_sudo_password: args.passwd,
        skip_health_checks: args.skip_health_checks,
        health_check_timeout: args
            .health_check_timeout
            .unwrap_or(ctx.config.deploy.health_check_timeout),
        secrets_base_dir,
        scratch_dir: scratch_dir.to_path_buf(),
        credentials: ctx.config.vault.credential_source(),
    }
}

fn summary(opts: &DeployOptions, hosts: usize) -> String {
    let hosts = ui::plural(hosts, "host", "hosts");
    if opts.dry_run || opts.mode == ActivationMode::Build {
        format!("Built {hosts}")
    } else {
        format!("Done: '{}' on {hosts}", opts.mode)
    }
}
