mod assets;
mod backend;
mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod runner;
mod sudo;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::MorphConfig;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: MorphConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Command::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "morph", &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = Context {
        quiet: cli.quiet,
        config: MorphConfig::load()?,
    };

    match &cli.command {
        Command::Deploy(args) => commands::deploy::run(&ctx, args),
        Command::CheckHealth(args) => commands::check_health::run(&ctx, args),
        Command::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn report(err: &anyhow::Error) {
    ui::error(&format!("{err:#}"));
    if let Some(err) = err.downcast_ref::<rollout::Error>() {
        ui::dim(err.category().description());
    }
}
