//! Rollout driver - build once, then walk the hosts in order
//!
//! Per host, each step runs only if the plan enables it:
//!
//! ```text
//! Selected → Pushed → CredentialRekeyed → SecretsUploaded → Activated → HealthChecked → Done
//! ```
//!
//! - Push, secret upload and activation failures are returned as errors and
//!   end the invocation; later hosts are never touched.
//! - A failed health check halts the rollout and is reported through
//!   [`RolloutOutcome::Halted`], not as an error.
//! - Credential rekey failures only produce warnings.
//!
//! Hosts already processed are never revisited or rolled back.

use crate::context::{
    Activator, Builder, HealthChecker, ProgressCallback, SecretService, Transport,
};
use crate::error::{Error, Result};
use crate::health;
use crate::plan::ActivationPlan;
use crate::secrets;
use crate::session::{CredentialSource, SessionManager};
use crate::types::{ActivationMode, Host, SudoPassword};
use std::path::PathBuf;

/// Options for one deploy invocation
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub mode: ActivationMode,
    /// Only evaluate and build
    pub dry_run: bool,
    /// Prompt for the remote sudo password when the plan needs it
    pub ask_sudo_password: bool,
    pub skip_health_checks: bool,
    /// Seconds allowed for each host's health checks, `0` for no deadline
    pub health_check_timeout: u64,
    /// Directory relative secret sources resolve against
    pub secrets_base_dir: PathBuf,
    /// Process-scoped directory for transient credential files
    pub scratch_dir: PathBuf,
    pub credentials: CredentialSource,
}

/// External systems the driver coordinates
pub struct Collaborators<'a, S: SecretService> {
    pub builder: &'a dyn Builder,
    pub transport: &'a dyn Transport,
    pub activator: &'a dyn Activator,
    pub health: &'a dyn HealthChecker,
    pub secret_service: &'a S,
}

/// How a rollout ended, when it did not fail
#[derive(Debug)]
pub enum RolloutOutcome {
    /// Every selected host reached the end of its steps
    Completed { deployed: Vec<String> },
    /// A host failed its health checks; hosts after it were not touched
    Halted {
        host: String,
        error: Error,
        deployed: Vec<String>,
    },
}

impl RolloutOutcome {
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }

    /// Hosts that completed every step
    pub fn deployed(&self) -> &[String] {
        match self {
            Self::Completed { deployed } | Self::Halted { deployed, .. } => deployed,
        }
    }
}

/// State threaded through the per-host loop
pub struct RolloutContext<'a, S: SecretService> {
    pub plan: ActivationPlan,
    /// Built artifact shared by every host
    pub artifact: PathBuf,
    /// Empty unless the plan asked for it
    pub sudo_password: SudoPassword,
    pub sessions: SessionManager<'a, S>,
}

enum HostOutcome {
    Done,
    Unhealthy(Error),
}

/// Build the artifact once and roll it out to `hosts` in order.
///
/// `ask_password` is called at most once, and only when the plan requires
/// a sudo password.
pub fn deploy<S, F>(
    hosts: &[Host],
    opts: &DeployOptions,
    collaborators: &Collaborators<'_, S>,
    ask_password: F,
    progress: &mut dyn ProgressCallback,
) -> Result<RolloutOutcome>
where
    S: SecretService,
    F: FnOnce() -> Result<SudoPassword>,
{
    let plan = ActivationPlan::resolve(opts.mode, opts.dry_run, opts.ask_sudo_password);
    log::debug!("Activation plan for '{}': {:?}", opts.mode, plan);

    let artifact = collaborators.builder.build(hosts)?;
    log::info!("Built {}", artifact.display());
    progress.on_build_complete(&artifact);

    let sudo_password = if plan.require_sudo_password {
        ask_password()?
    } else {
        SudoPassword::empty()
    };

    let mut ctx = RolloutContext {
        plan,
        artifact,
        sudo_password,
        sessions: SessionManager::new(collaborators.secret_service, opts.credentials.clone()),
    };

    let mut deployed = Vec::with_capacity(hosts.len());
    for host in hosts {
        match deploy_host(&mut ctx, host, opts, collaborators, progress)? {
            HostOutcome::Done => {
                progress.on_host_done(host);
                deployed.push(host.hostname().to_string());
            }
            HostOutcome::Unhealthy(error) => {
                log::warn!("Halting rollout at {}: {error}", host.hostname());
                return Ok(RolloutOutcome::Halted {
                    host: host.hostname().to_string(),
                    error,
                    deployed,
                });
            }
        }
    }

    Ok(RolloutOutcome::Completed { deployed })
}

fn deploy_host<S: SecretService>(
    ctx: &mut RolloutContext<'_, S>,
    host: &Host,
    opts: &DeployOptions,
    collaborators: &Collaborators<'_, S>,
    progress: &mut dyn ProgressCallback,
) -> Result<HostOutcome> {
    log::debug!("Deploying {}", host.hostname());

    if ctx.plan.push {
        let paths = collaborators.builder.paths_to_push(host, &ctx.artifact)?;
        progress.on_push(host, &paths);
        collaborators.transport.push(host, &paths)?;
    }

    if ctx.plan.upload_secrets && host.wants_dynamic_credential() {
        let service = ctx.sessions.service();
        if let Some(session) = ctx.sessions.ensure_session(progress) {
            secrets::rekey_dynamic_credential(
                service,
                session,
                collaborators.transport,
                host,
                &ctx.sudo_password,
                &opts.scratch_dir,
                progress,
            );
        }
    }

    if ctx.plan.upload_secrets {
        secrets::upload_static_secrets(
            collaborators.transport,
            host,
            &ctx.sudo_password,
            &opts.secrets_base_dir,
            progress,
        )?;
    }

    if ctx.plan.activate {
        let system_path = collaborators.builder.system_path(host, &ctx.artifact)?;
        progress.on_activate(host, opts.mode);
        collaborators
            .activator
            .activate(host, &system_path, opts.mode, &ctx.sudo_password)?;
    }

    if ctx.plan.push && !opts.skip_health_checks {
        if let Err(err) = health::gate(
            collaborators.health,
            host,
            opts.health_check_timeout,
            progress,
        ) {
            return Ok(HostOutcome::Unhealthy(err));
        }
    }

    Ok(HostOutcome::Done)
}
