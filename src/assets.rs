//! Process-scoped scratch directory
//!
//! Holds the bundled Nix expressions, the build result link and transient
//! credential files. Everything is removed when [`Scratch`] is dropped.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EVAL_MACHINES: &str = include_str!("assets/eval-machines.nix");
const OPTIONS: &str = include_str!("assets/options.nix");

pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create the scratch directory and unpack the bundled expressions
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("morph-")
            .tempdir()
            .context("Could not create scratch directory")?;
        Self::unpack(dir)
    }

    fn unpack(dir: TempDir) -> Result<Self> {
        for (name, contents) in [("eval-machines.nix", EVAL_MACHINES), ("options.nix", OPTIONS)] {
            let path = dir.path().join(name);
            fs::write(&path, contents)
                .with_context(|| format!("Could not write {}", path.display()))?;
        }
        log::debug!("Unpacked assets into {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Bundled machine evaluation expression
    pub fn eval_machines(&self) -> PathBuf {
        self.path().join("eval-machines.nix")
    }

    /// Out-link for the build result
    pub fn result_link(&self) -> PathBuf {
        self.path().join("result")
    }
}
