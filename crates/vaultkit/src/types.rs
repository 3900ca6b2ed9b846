//! Request and response types for the token endpoints.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Token role every host token is created under
pub const HOST_ROLE: &str = "morph-host";

/// Prefix of per-host policy names
pub const HOST_POLICY_PREFIX: &str = "morph-host-";

/// Token metadata key naming the host a token belongs to
pub const HOST_META_KEY: &str = "morph_host";

/// Settings of the host token role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRole {
    pub allowed_policies_glob: Vec<String>,
    /// Host tokens outlive the deploying operator's token
    pub orphan: bool,
    pub renewable: bool,
    /// Periodic tokens never expire while renewed within this window
    pub token_period: String,
}

impl Default for TokenRole {
    fn default() -> Self {
        Self {
            allowed_policies_glob: vec![format!("{HOST_POLICY_PREFIX}*")],
            orphan: true,
            renewable: true,
            token_period: "768h".to_string(),
        }
    }
}

/// Freshly issued host token
#[derive(Clone, PartialEq, Eq)]
pub struct HostToken {
    pub accessor: String,
    pub token: String,
}

impl fmt::Debug for HostToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostToken")
            .field("accessor", &self.accessor)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Validate a host name for use in policy names and token metadata
pub fn validate_host_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidHostName(name.to_string()))
    }
}

/// Name of the policy attached to a host's token
pub fn host_policy_name(host: &str) -> String {
    format!("{HOST_POLICY_PREFIX}{host}")
}

/// ACL policy granting a host read access to its own secrets
pub fn host_policy(host: &str) -> String {
    format!(
        r#"path "secret/data/hosts/{host}/*" {{
  capabilities = ["read"]
}}

path "secret/metadata/hosts/{host}/*" {{
  capabilities = ["read", "list"]
}}
"#
    )
}

#[derive(Debug, Serialize)]
pub(crate) struct PolicyRequest<'a> {
    pub policy: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AccessorRequest<'a> {
    pub accessor: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTokenRequest {
    pub policies: Vec<String>,
    pub meta: BTreeMap<String, String>,
    pub display_name: String,
}

impl CreateTokenRequest {
    pub fn for_host(host: &str) -> Self {
        let policy = host_policy_name(host);
        Self {
            policies: vec![policy.clone()],
            meta: BTreeMap::from([(HOST_META_KEY.to_string(), host.to_string())]),
            display_name: policy,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeyList {
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenInfo {
    #[serde(default)]
    pub meta: Option<BTreeMap<String, String>>,
}

impl TokenInfo {
    pub fn belongs_to(&self, host: &str) -> bool {
        self.meta
            .as_ref()
            .and_then(|m| m.get(HOST_META_KEY))
            .is_some_and(|h| h == host)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub auth: AuthInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthInfo {
    pub client_token: String,
    pub accessor: String,
}

impl From<AuthInfo> for HostToken {
    fn from(auth: AuthInfo) -> Self {
        Self {
            accessor: auth.accessor,
            token: auth.client_token,
        }
    }
}
