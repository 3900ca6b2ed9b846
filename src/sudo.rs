//! Remote sudo
//!
//! The password is asked for at most once per invocation and only ever
//! travels to hosts on the stdin of `sudo -S`. Without a password, remote
//! commands run under `sudo -n` and fail instead of prompting.

use crate::runner::shell_quote;
use dialoguer::Password;
use rollout::{Error, SudoPassword};

/// Prompt for the remote sudo password on the terminal
pub fn prompt_password() -> rollout::Result<SudoPassword> {
    let password = Password::new()
        .with_prompt("Remote sudo password")
        .allow_empty_password(true)
        .interact()
        .map_err(|e| Error::Password {
            message: e.to_string(),
        })?;
    Ok(SudoPassword::new(password))
}

/// A remote command line prepared to run under sudo
#[derive(Debug)]
pub struct SudoCommand {
    /// Shell command line to hand to ssh
    pub command_line: String,
    /// Whether the password must be written to the command's stdin
    pub needs_stdin: bool,
}

/// Wrap a POSIX shell script so it runs as root on the remote host
pub fn wrap(script: &str, password: &SudoPassword) -> SudoCommand {
    let quoted = shell_quote(script);
    if password.is_empty() {
        SudoCommand {
            command_line: format!("sudo -n sh -c {quoted}"),
            needs_stdin: false,
        }
    } else {
        SudoCommand {
            command_line: format!("sudo -S -p '' sh -c {quoted}"),
            needs_stdin: true,
        }
    }
}
