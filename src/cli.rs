use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use rollout::{ActivationMode, SelectOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "morph")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "NixOS host manager", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build machines and roll them out host by host
    Deploy(DeployArgs),

    /// Run health checks against deployed machines
    CheckHealth(CheckHealthArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Host Selection
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Glob for selecting hosts in the deployment
    #[arg(long, default_value = "*")]
    pub on: String,

    /// Select every n-th host
    #[arg(long, default_value_t = 1)]
    pub every: usize,

    /// Skip the first n hosts
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Select at most n hosts
    #[arg(long)]
    pub limit: Option<usize>,
}

impl From<&SelectionArgs> for SelectOptions {
    fn from(args: &SelectionArgs) -> Self {
        Self {
            pattern: args.on.clone(),
            skip: args.skip,
            every: args.every,
            limit: args.limit,
        }
    }
}

// ============================================================================
// Deploy
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Build,
    Push,
    DryActivate,
    Test,
    Switch,
    Boot,
}

impl From<ModeArg> for ActivationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Build => Self::Build,
            ModeArg::Push => Self::Push,
            ModeArg::DryActivate => Self::DryActivate,
            ModeArg::Test => Self::Test,
            ModeArg::Switch => Self::Switch,
            ModeArg::Boot => Self::Boot,
        }
    }
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// File containing the deployment expression
    pub deployment: PathBuf,

    /// What to do with the built machines
    #[arg(value_enum)]
    pub mode: ModeArg,

    /// Only evaluate and build, never touch hosts
    #[arg(long)]
    pub dry_run: bool,

    /// Ask interactively for the remote sudo password
    #[arg(long)]
    pub passwd: bool,

    /// Do not run health checks after each host
    #[arg(long)]
    pub skip_health_checks: bool,

    /// Seconds to wait for all health checks on a host (0 waits forever)
    #[arg(long, value_name = "SECONDS")]
    pub health_check_timeout: Option<u64>,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

// ============================================================================
// Check Health
// ============================================================================

#[derive(Args, Debug)]
pub struct CheckHealthArgs {
    /// File containing the deployment expression
    pub deployment: PathBuf,

    /// Seconds to wait for all health checks on a host (0 waits forever)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub selection: SelectionArgs,
}
