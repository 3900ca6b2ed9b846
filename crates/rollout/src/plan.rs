//! Activation plan - which per-host steps run for a requested mode

use crate::types::ActivationMode;

/// Steps enabled for every host of one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationPlan {
    /// Copy the built closure to the host
    pub push: bool,
    /// Prompt once for the remote sudo password
    pub require_sudo_password: bool,
    /// Deliver static secrets (and rekeyed credentials)
    pub upload_secrets: bool,
    /// Run the activation on the host
    pub activate: bool,
}

impl ActivationPlan {
    /// Resolve the plan for a mode.
    ///
    /// | mode                  | push | sudo password     | secrets | activate |
    /// |-----------------------|------|-------------------|---------|----------|
    /// | build                 | no   | no                | no      | no       |
    /// | push                  | yes  | no                | no      | no       |
    /// | dry-activate          | yes  | if `ask_password` | no      | yes      |
    /// | test / switch / boot  | yes  | if `ask_password` | yes     | yes      |
    ///
    /// `dry_run` disables everything.
    pub const fn resolve(mode: ActivationMode, dry_run: bool, ask_password: bool) -> Self {
        if dry_run {
            return Self {
                push: false,
                require_sudo_password: false,
                upload_secrets: false,
                activate: false,
            };
        }

        match mode {
            ActivationMode::Build => Self {
                push: false,
                require_sudo_password: false,
                upload_secrets: false,
                activate: false,
            },
            ActivationMode::Push => Self {
                push: true,
                require_sudo_password: false,
                upload_secrets: false,
                activate: false,
            },
            ActivationMode::DryActivate => Self {
                push: true,
                require_sudo_password: ask_password,
                upload_secrets: false,
                activate: true,
            },
            ActivationMode::Test | ActivationMode::Switch | ActivationMode::Boot => Self {
                push: true,
                require_sudo_password: ask_password,
                upload_secrets: true,
                activate: true,
            },
        }
    }

    /// Whether any step reaches the hosts
    pub const fn touches_hosts(&self) -> bool {
        self.push || self.upload_secrets || self.activate
    }
}
