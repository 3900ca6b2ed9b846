//! Core types for fleet rollouts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zeroize::Zeroizing;

/// A host from the deployment inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    /// Name of the host in the deployment
    pub name: String,
    /// Address used to reach the host over ssh
    pub target_host: String,
    /// Statically declared secrets, keyed by secret name
    #[serde(default)]
    pub secrets: BTreeMap<String, Secret>,
    #[serde(default)]
    pub health_checks: HealthChecks,
    /// Dynamic credential settings
    #[serde(default)]
    pub vault: DynamicCredentialOptions,
}

impl Host {
    /// Create a host with no secrets, health checks or dynamic credentials
    pub fn new(name: impl Into<String>, target_host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_host: target_host.into(),
            secrets: BTreeMap::new(),
            health_checks: HealthChecks::default(),
            vault: DynamicCredentialOptions::default(),
        }
    }

    /// Name used for selection and reporting
    pub fn hostname(&self) -> &str {
        if self.name.is_empty() {
            &self.target_host
        } else {
            &self.name
        }
    }

    /// Whether the host opted into dynamically rekeyed credentials
    pub fn wants_dynamic_credential(&self) -> bool {
        self.vault.enable
    }

    /// Total number of configured health checks
    pub fn health_check_count(&self) -> usize {
        self.health_checks.cmd.len() + self.health_checks.http.len()
    }
}

/// Owner of a file delivered to a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub user: String,
    pub group: String,
}

impl Default for Owner {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            group: "root".to_string(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user, self.group)
    }
}

/// A file to deliver to a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Local source path, relative paths resolve against the deployment directory
    pub source: PathBuf,
    /// Absolute destination path on the host
    pub destination: PathBuf,
    #[serde(default)]
    pub owner: Owner,
    /// Permission bits in chmod notation (e.g. "0400")
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

fn default_permissions() -> String {
    "0400".to_string()
}

impl Secret {
    /// Resolve the source path against a base directory
    pub fn resolve_source(&self, base_dir: &Path) -> PathBuf {
        if self.source.is_absolute() {
            self.source.clone()
        } else {
            base_dir.join(&self.source)
        }
    }
}

/// Health checks configured for a host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthChecks {
    #[serde(default)]
    pub cmd: Vec<CmdHealthCheck>,
    #[serde(default)]
    pub http: Vec<HttpHealthCheck>,
}

impl HealthChecks {
    pub fn is_empty(&self) -> bool {
        self.cmd.is_empty() && self.http.is_empty()
    }
}

/// A command run on the host; exit status 0 means healthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdHealthCheck {
    #[serde(default)]
    pub description: String,
    pub cmd: Vec<String>,
    /// Seconds between attempts
    #[serde(default = "default_period")]
    pub period: u64,
    /// Seconds before a single attempt is abandoned
    #[serde(default = "default_check_timeout")]
    pub timeout: u64,
}

/// An HTTP endpoint probed from the deploying machine; any 2xx means healthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpHealthCheck {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Overrides the host's target address when set
    #[serde(default)]
    pub host: Option<String>,
    pub port: u16,
    #[serde(default = "default_http_path")]
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, rename = "insecureSSL")]
    pub insecure_ssl: bool,
    #[serde(default = "default_period")]
    pub period: u64,
    #[serde(default = "default_check_timeout")]
    pub timeout: u64,
}

impl HttpHealthCheck {
    /// URL probed for the given host
    pub fn url(&self, host: &Host) -> String {
        let address = self.host.as_deref().unwrap_or(&host.target_host);
        let path = self.path.trim_start_matches('/');
        format!("{}://{}:{}/{}", self.scheme, address, self.port, path)
    }
}

fn default_period() -> u64 {
    2
}

fn default_check_timeout() -> u64 {
    10
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_http_path() -> String {
    "/".to_string()
}

/// Opt-in for dynamically rekeyed credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicCredentialOptions {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub destination_file: DestinationFile,
}

/// Where the rekeyed credential file lands on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationFile {
    pub path: PathBuf,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

impl Default for DestinationFile {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/secrets/vault.env"),
            owner: Owner::default(),
            permissions: default_permissions(),
        }
    }
}

/// Accessor and token returned by a rekey
#[derive(Clone, PartialEq, Eq)]
pub struct DynamicCredential {
    pub accessor: String,
    pub token: String,
}

impl DynamicCredential {
    /// Environment-file rendering delivered to the host
    pub fn to_env_file(&self) -> String {
        format!(
            "VAULT_ACCESSOR={}\nVAULT_TOKEN={}\n",
            self.accessor, self.token
        )
    }
}

impl fmt::Debug for DynamicCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCredential")
            .field("accessor", &self.accessor)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Remote sudo password, empty when not requested
#[derive(Clone, Default)]
pub struct SudoPassword(Zeroizing<String>);

impl SudoPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SudoPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("SudoPassword(<none>)")
        } else {
            f.write_str("SudoPassword(<redacted>)")
        }
    }
}

/// Requested activation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationMode {
    /// Build only
    Build,
    /// Build and copy closures to hosts
    Push,
    /// Show what activation would change
    DryActivate,
    /// Activate without making it the boot default
    Test,
    /// Activate and make it the boot default
    Switch,
    /// Make it the boot default without activating
    Boot,
}

impl ActivationMode {
    pub const ALL: [Self; 6] = [
        Self::Build,
        Self::Push,
        Self::DryActivate,
        Self::Test,
        Self::Switch,
        Self::Boot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Push => "push",
            Self::DryActivate => "dry-activate",
            Self::Test => "test",
            Self::Switch => "switch",
            Self::Boot => "boot",
        }
    }

    /// Whether activation also updates the system profile
    pub fn updates_profile(&self) -> bool {
        matches!(self, Self::Switch | Self::Boot)
    }
}

impl fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                format!("unknown activation mode '{s}' (expected build|push|dry-activate|test|switch|boot)")
            })
    }
}
