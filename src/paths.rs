//! Path resolution for morph
//!
//! # Environment Variables
//!
//! - `MORPH_CONFIG` - Explicit config file
//! - `MORPH_CONFIG_DIR` - Override config directory
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. `MORPH_CONFIG` environment variable
//! 2. `config_dir()/config.toml`
//!
//! For config_dir():
//! 1. `MORPH_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/morph` (if set)
//! 3. Platform config directory (`~/.config/morph`, `%APPDATA%\morph`, ...)

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for an explicit config file
pub const ENV_CONFIG: &str = "MORPH_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "MORPH_CONFIG_DIR";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the morph config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("morph");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let base = dirs::config_dir().context("Could not determine config directory")?;
    let path = base.join("morph");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the config file path (which may not exist)
pub fn config_file() -> Result<PathBuf> {
    if let Ok(file) = std::env::var(ENV_CONFIG) {
        return Ok(expand(&file));
    }
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
