//! Optional user configuration (`config.toml`)
//!
//! ```toml
//! [ssh]
//! user = "deploy"
//! options = ["-o", "StrictHostKeyChecking=accept-new"]
//!
//! [nix]
//! eval_machines = "~/morph/eval-machines.nix"
//!
//! [deploy]
//! health_check_timeout = 120
//!
//! [vault]
//! address_env = "VAULT_ADDR"
//! token_env = "VAULT_TOKEN"
//! ```

use crate::paths;
use anyhow::{Context, Result};
use rollout::{CredentialSource, DEFAULT_ADDRESS_VAR, DEFAULT_TOKEN_VAR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MorphConfig {
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub nix: NixConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub vault: VaultConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    /// Login user on target hosts, ssh's own default when unset
    pub user: Option<String>,
    /// Extra arguments passed to ssh, scp and nix-copy-closure
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NixConfig {
    /// Replaces the bundled evaluation expression
    pub eval_machines: Option<String>,
}

impl NixConfig {
    pub fn eval_machines_path(&self) -> Option<PathBuf> {
        self.eval_machines.as_deref().map(paths::expand)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Seconds, `0` waits indefinitely
    #[serde(default)]
    pub health_check_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    #[serde(default = "default_address_env")]
    pub address_env: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_address_env() -> String {
    DEFAULT_ADDRESS_VAR.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_VAR.to_string()
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address_env: default_address_env(),
            token_env: default_token_env(),
        }
    }
}

impl VaultConfig {
    pub fn credential_source(&self) -> CredentialSource {
        CredentialSource::env(&self.address_env, &self.token_env)
    }
}

impl MorphConfig {
    /// Load the config file, or defaults when there is none
    pub fn load() -> Result<Self> {
        let path = paths::config_file()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}
