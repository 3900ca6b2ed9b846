use anyhow::Result;
use colored::Colorize;
use rollout::HealthReport;
use std::process::ExitCode;

use crate::Context;
use crate::assets::Scratch;
use crate::backend::SshOptions;
use crate::backend::health::NetworkHealthChecker;
use crate::cli::CheckHealthArgs;
use crate::progress::ConsoleProgress;
use crate::ui;

use super::EXIT_UNHEALTHY;

pub fn run(ctx: &Context, args: &CheckHealthArgs) -> Result<ExitCode> {
    super::ensure_tools()?;

    let scratch = Scratch::create()?;
    let deployment = super::deployment_path(&args.deployment)?;
    let builder = super::nix_builder(&ctx.config, &scratch, deployment);

    let mut progress = ConsoleProgress::new();
    let hosts = super::select_hosts(&builder, &args.selection, &mut progress)?;

    let checker = NetworkHealthChecker::new(SshOptions::from(&ctx.config.ssh));
    let timeout = args.timeout.unwrap_or(ctx.config.deploy.health_check_timeout);
    let report = rollout::check_fleet(&checker, &hosts, timeout, &mut progress);

    println!();
    print_report(&report);

    if report.is_healthy() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_UNHEALTHY))
    }
}

fn print_report(report: &HealthReport) {
    if report.is_healthy() {
        ui::success(&format!(
            "{} healthy",
            ui::plural(report.checked(), "host", "hosts")
        ));
        return;
    }

    ui::header(&format!(
        "{} of {} unhealthy",
        report.unhealthy.len(),
        ui::plural(report.checked(), "host", "hosts")
    ));
    for (host, error) in &report.unhealthy {
        println!("  {} {}", "✗".red(), host.bold());
        if let rollout::Error::HealthCheck { failed, .. } = error {
            for check in failed {
                println!("      {}", check.dimmed());
            }
        } else {
            println!("      {}", error.to_string().dimmed());
        }
    }
}
