//! Nix evaluation and builds

use crate::runner;
use rollout::{Builder, Error, Host, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Evaluates a deployment file and builds its machines with `nix-build`
#[derive(Debug)]
pub struct NixBuilder {
    eval_machines: PathBuf,
    deployment: PathBuf,
    out_link: PathBuf,
}

impl NixBuilder {
    pub fn new(eval_machines: PathBuf, deployment: PathBuf, out_link: PathBuf) -> Self {
        Self {
            eval_machines,
            deployment,
            out_link,
        }
    }

    /// Evaluate the deployment into its host inventory
    pub fn resolve_inventory(&self) -> Result<Vec<Host>> {
        let args = self.eval_args(&[
            "--eval",
            "--strict",
            "--json",
            "-A",
            "info.machineList",
        ]);
        let json = runner::run_capture("nix-instantiate", &args).map_err(|e| Error::Evaluation {
            message: format!("{e:#}"),
        })?;
        parse_inventory(&json)
    }

    fn eval_args(&self, extra: &[&str]) -> Vec<String> {
        let mut args = vec![
            self.eval_machines.to_string_lossy().into_owned(),
            "--arg".to_string(),
            "networkExpr".to_string(),
            self.deployment.to_string_lossy().into_owned(),
        ];
        args.extend(extra.iter().map(|s| (*s).to_string()));
        args
    }
}

impl Builder for NixBuilder {
    fn build(&self, hosts: &[Host]) -> Result<PathBuf> {
        let names: Vec<&str> = hosts.iter().map(|h| h.name.as_str()).collect();
        let out_link = self.out_link.to_string_lossy().into_owned();
        let args = self.eval_args(&[
            "-A",
            "machines",
            "--arg",
            "names",
            &nix_string_list(&names),
            "--out-link",
            &out_link,
        ]);

        runner::run_checked_env("nix-build", &args, &[]).map_err(|e| Error::Build {
            message: format!("{e:#}"),
        })?;

        fs::canonicalize(&self.out_link).map_err(|e| Error::io(&self.out_link, e))
    }

    fn paths_to_push(&self, host: &Host, artifact: &Path) -> Result<Vec<PathBuf>> {
        Ok(vec![self.system_path(host, artifact)?])
    }

    fn system_path(&self, host: &Host, artifact: &Path) -> Result<PathBuf> {
        let link = artifact.join(&host.name);
        match fs::canonicalize(&link) {
            Ok(path) => Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound { path: link }),
            Err(e) => Err(Error::io(link, e)),
        }
    }
}

/// Decode `info.machineList` JSON
pub fn parse_inventory(json: &str) -> Result<Vec<Host>> {
    serde_json::from_str(json).map_err(|e| Error::Evaluation {
        message: format!("invalid machine list: {e}"),
    })
}

/// Render names as a Nix list of strings
fn nix_string_list(names: &[&str]) -> String {
    let items: Vec<String> = names.iter().map(|n| nix_string(n)).collect();
    format!("[ {} ]", items.join(" "))
}

fn nix_string(s: &str) -> String {
    let escaped = s
        .replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace("${", "\\${");
    format!("\"{escaped}\"")
}
