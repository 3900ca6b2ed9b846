use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn describe(cmd: &str, args: &[String]) -> String {
    format!("{} {}", cmd, args.join(" "))
}

/// Run a command with extra environment, inheriting stdio, and fail on non-zero exit
pub fn run_checked_env(cmd: &str, args: &[String], env: &[(&str, &str)]) -> Result<()> {
    log::debug!("Running: {}", describe(cmd, args));
    let status = Command::new(cmd)
        .args(args)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))?;

    if !status.success() {
        bail!("{cmd} exited with {status}");
    }
    Ok(())
}

/// Run a command and capture output
pub fn run_capture(cmd: &str, args: &[String]) -> Result<String> {
    log::debug!("Running: {}", describe(cmd, args));
    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("Command failed: {}", stderr.trim())
    }
}

/// Run a command, feeding `input` on stdin.
///
/// Stdout and stderr are inherited unless `capture` is set, in which case
/// they are returned in the `Output`.
pub fn run_with_input(
    cmd: &str,
    args: &[String],
    input: Option<&str>,
    capture: bool,
) -> Result<Output> {
    log::debug!("Running: {}", describe(cmd, args));
    let (stdout, stderr) = if capture {
        (Stdio::piped(), Stdio::piped())
    } else {
        (Stdio::inherit(), Stdio::inherit())
    };

    let mut child = Command::new(cmd)
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin
            .write_all(input.as_bytes())
            .and_then(|()| stdin.write_all(b"\n"))
            .with_context(|| format!("Failed to write to {cmd}"))?;
    }

    child
        .wait_with_output()
        .with_context(|| format!("Failed to wait for {cmd}"))
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[String]) -> bool {
    log::debug!("Running: {}", describe(cmd, args));
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run a command silently, killing it once `timeout` has elapsed.
///
/// Returns true only when the command exited successfully in time.
pub fn run_quiet_timeout(cmd: &str, args: &[String], timeout: Duration) -> bool {
    log::debug!("Running ({timeout:?} budget): {}", describe(cmd, args));
    let mut child = match Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            log::debug!("Failed to execute {cmd}: {e}");
            return false;
        }
    };

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {}
            Err(e) => {
                log::debug!("Failed to wait for {cmd}: {e}");
                break;
            }
        }
        if started.elapsed() >= timeout {
            log::debug!("{cmd} still running after {timeout:?}, killing it");
            break;
        }
        thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(started.elapsed())));
    }

    let _ = child.kill();
    let _ = child.wait();
    false
}

/// Check if a command exists on PATH
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Commands from `required` that are not on PATH, in order
pub fn missing_commands<'a>(required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|cmd| !command_exists(cmd))
        .collect()
}

/// Quote a string for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Quote a path for a POSIX shell
pub fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}
