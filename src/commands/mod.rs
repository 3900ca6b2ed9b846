pub mod check_health;
pub mod deploy;

use anyhow::{Context as _, Result};
use rollout::{Host, ProgressCallback, SelectOptions};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assets::Scratch;
use crate::backend::REQUIRED_COMMANDS;
use crate::backend::nix::NixBuilder;
use crate::cli::SelectionArgs;
use crate::config::MorphConfig;
use crate::progress;
use crate::runner;

/// Exit status when a rollout halted or a host failed its health checks
pub const EXIT_UNHEALTHY: u8 = 3;

/// Fail unless every external tool morph drives is on PATH
pub fn ensure_tools() -> Result<()> {
    let missing = runner::missing_commands(REQUIRED_COMMANDS);
    if missing.is_empty() {
        return Ok(());
    }
    Err(rollout::Error::MissingExecutables(
        missing.into_iter().map(str::to_string).collect(),
    )
    .into())
}

/// Absolute path of the deployment file
pub fn deployment_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path)
        .with_context(|| format!("Deployment file not found: {}", path.display()))
}

/// Directory relative secret sources resolve against.
///
/// Symlinks are kept, so a linked deployment file resolves secrets next to
/// the link.
pub fn secrets_base_dir(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Could not resolve {}", path.display()))?;
    Ok(absolute
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf))
}

/// Builder for a deployment, honoring a configured evaluation expression
pub fn nix_builder(config: &MorphConfig, scratch: &Scratch, deployment: PathBuf) -> NixBuilder {
    let eval_machines = config
        .nix
        .eval_machines_path()
        .unwrap_or_else(|| scratch.eval_machines());
    NixBuilder::new(eval_machines, deployment, scratch.result_link())
}

/// Evaluate the deployment and narrow it down to the selected hosts
pub fn select_hosts(
    builder: &NixBuilder,
    args: &SelectionArgs,
    progress: &mut dyn ProgressCallback,
) -> Result<Vec<Host>> {
    let pb = progress::spinner("Evaluating deployment");
    let inventory = builder.resolve_inventory();
    pb.finish_and_clear();

    let selection = rollout::select(inventory?, &SelectOptions::from(args))?;
    progress.on_selection(&selection);
    Ok(selection.hosts)
}
