//! Progress reporting for the terminal

use crate::ui;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rollout::{ActivationMode, Error, Host, ProgressCallback, Selection};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Spinner on stderr, hidden when stderr is not a terminal
pub fn spinner(msg: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} {msg} {elapsed:.dim}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::success(msg);
}

pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::error(msg);
}

/// Print the selected hosts
pub fn print_selection(selection: &Selection) {
    println!(
        "Selected {}/{} hosts (name filter:-{}, limits:-{}):",
        selection.hosts.len(),
        selection.total,
        selection.name_filtered(),
        selection.limit_filtered()
    );
    for (index, host) in selection.hosts.iter().enumerate() {
        println!(
            "\t{index:3}: {} (secrets: {}, health checks: {})",
            host.hostname(),
            host.secrets.len(),
            host.health_check_count()
        );
    }
    println!();
}

/// Console progress for deploy and check-health
#[derive(Default)]
pub struct ConsoleProgress {
    health: Option<ProgressBar>,
    warnings: usize,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings reported so far
    pub fn warnings(&self) -> usize {
        self.warnings
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_selection(&mut self, selection: &Selection) {
        print_selection(selection);
    }

    fn on_build_complete(&mut self, artifact: &Path) {
        ui::kv("nix result path", &artifact.display().to_string());
        println!();
    }

    fn on_push(&mut self, host: &Host, paths: &[PathBuf]) {
        ui::header(host.hostname());
        println!("Pushing paths to {}:", host.target_host);
        for path in paths {
            println!("\t* {}", path.display());
        }
    }

    fn on_secrets_start(&mut self, host: &Host) {
        if !host.secrets.is_empty() {
            println!("Uploading secrets to {}:", host.hostname());
        }
    }

    fn on_secret_start(&mut self, name: &str, size: u64) {
        print!("\t* {name} ({}).. ", ui::format_size(size));
        let _ = io::stdout().flush();
    }

    fn on_secret_complete(&mut self, _name: &str, success: bool) {
        if success {
            println!("{}", "OK".green());
        } else {
            println!("{}", "Failed".red());
        }
    }

    fn on_credential_rekeyed(&mut self, host: &Host) {
        ui::success(&format!(
            "Vault: secret token for \"{}\" got rekeyed",
            host.target_host
        ));
    }

    fn on_activate(&mut self, host: &Host, mode: ActivationMode) {
        println!("Executing '{mode}' on {}", host.target_host.bold());
    }

    fn on_health_check_start(&mut self, host: &Host) {
        if host.health_checks.is_empty() {
            return;
        }
        self.health = Some(spinner(format!(
            "Running {} on {}",
            ui::plural(host.health_check_count(), "health check", "health checks"),
            host.hostname()
        )));
    }

    fn on_health_check_complete(&mut self, host: &Host, result: &rollout::Result<()>) {
        let pb = self.health.take();
        let msg = match result {
            Ok(()) if host.health_checks.is_empty() => return,
            Ok(()) => format!("Health checks OK on {}", host.hostname()),
            Err(err) => err.to_string(),
        };
        match (pb, result.is_ok()) {
            (Some(pb), true) => finish_success(&pb, &msg),
            (Some(pb), false) => finish_error(&pb, &msg),
            (None, true) => ui::success(&msg),
            (None, false) => ui::error(&msg),
        }
    }

    fn on_host_done(&mut self, host: &Host) {
        ui::success(&format!("Done: {}", host.hostname()));
    }

    fn on_warning(&mut self, error: &Error) {
        self.warnings += 1;
        if error.is_recoverable() {
            ui::banner_warn(
                "Interaction with Vault failed, host tokens will not be rekeyed",
                &error.to_string(),
            );
        } else {
            ui::warn(&error.to_string());
        }
    }
}
