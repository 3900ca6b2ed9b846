//! # Vaultkit
//!
//! Blocking client for the handful of Vault token endpoints needed to give
//! every deployed host its own periodic token.
//!
//! Each host token:
//! - is created under the [`HOST_ROLE`] token role
//! - carries a policy named `morph-host-<host>`
//! - is tagged with the host name in its metadata
//!
//! Rekeying a host revokes every earlier token tagged with its name.
//!
//! ```no_run
//! use vaultkit::Client;
//!
//! let client = Client::authenticate("https://vault.example.net:8200", "root-token")?;
//! client.configure()?;
//! let token = client.rekey_host("web01")?;
//! println!("new accessor {}", token.accessor);
//! # Ok::<(), vaultkit::Error>(())
//! ```

mod error;
mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{
    HOST_META_KEY, HOST_POLICY_PREFIX, HOST_ROLE, HostToken, TokenRole, host_policy,
    host_policy_name, validate_host_name,
};

use serde::Serialize;
use serde::de::DeserializeOwned;
use types::{
    AccessorRequest, AuthResponse, CreateTokenRequest, DataResponse, KeyList, PolicyRequest,
    TokenInfo,
};

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Authenticated Vault client
pub struct Client {
    agent: ureq::Agent,
    address: String,
    token: String,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client without contacting the server.
    pub fn new(address: &str, token: impl Into<String>) -> Result<Self> {
        let address = normalize_address(address)?;
        Ok(Self {
            agent: ureq::Agent::new_with_defaults(),
            address,
            token: token.into(),
        })
    }

    /// Create a client and verify the token against the server.
    pub fn authenticate(address: &str, token: impl Into<String>) -> Result<Self> {
        let client = Self::new(address, token)?;
        client.lookup_self()?;
        log::debug!("Authenticated against {}", client.address);
        Ok(client)
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Check that the token is valid
    pub fn lookup_self(&self) -> Result<()> {
        let _: serde_json::Value = self.get_json("auth/token/lookup-self")?;
        Ok(())
    }

    /// Create or update the token role host tokens are issued under.
    pub fn configure(&self) -> Result<()> {
        self.configure_role(&TokenRole::default())
    }

    pub fn configure_role(&self, role: &TokenRole) -> Result<()> {
        self.post::<serde_json::Value>(&format!("auth/token/roles/{HOST_ROLE}"), role)?;
        log::debug!("Configured token role {HOST_ROLE}");
        Ok(())
    }

    /// Issue a new token for `host` and revoke its earlier ones.
    ///
    /// The host's policy is written first so the new token is usable as
    /// soon as it is delivered.
    pub fn rekey_host(&self, host: &str) -> Result<HostToken> {
        validate_host_name(host)?;

        self.put(
            &format!("sys/policies/acl/{}", host_policy_name(host)),
            &PolicyRequest {
                policy: &host_policy(host),
            },
        )?;

        let revoked = self.revoke_host_tokens(host)?;
        if revoked > 0 {
            log::debug!("Revoked {revoked} earlier token(s) of {host}");
        }

        let response: AuthResponse = self
            .post(
                &format!("auth/token/create/{HOST_ROLE}"),
                &CreateTokenRequest::for_host(host),
            )?
            .ok_or_else(|| Error::InvalidResponse("token create returned no body".into()))?;

        Ok(response.auth.into())
    }

    /// Revoke every token tagged with `host`, returning how many were revoked.
    ///
    /// Accessors that can no longer be looked up (expired or revoked since
    /// the listing) are skipped.
    pub fn revoke_host_tokens(&self, host: &str) -> Result<usize> {
        let mut revoked = 0;
        for accessor in self.list_accessors()? {
            let info: Option<DataResponse<TokenInfo>> = match self.post(
                "auth/token/lookup-accessor",
                &AccessorRequest {
                    accessor: &accessor,
                },
            ) {
                Ok(info) => info,
                Err(e) if is_stale_accessor(&e) => {
                    log::debug!("Skipping accessor {accessor}: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if info.is_some_and(|i| i.data.belongs_to(host)) {
                self.post::<serde_json::Value>(
                    "auth/token/revoke-accessor",
                    &AccessorRequest {
                        accessor: &accessor,
                    },
                )?;
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    fn list_accessors(&self) -> Result<Vec<String>> {
        match self.get_json::<DataResponse<KeyList>>("auth/token/accessors?list=true") {
            Ok(list) => Ok(list.data.keys),
            // Vault answers 404 for an empty list
            Err(e) if e.status() == Some(404) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self
            .agent
            .get(&self.url(path))
            .header(TOKEN_HEADER, &self.token)
            .call()?
            .body_mut()
            .read_json()?;
        Ok(value)
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<Option<T>> {
        let mut response = self
            .agent
            .post(&self.url(path))
            .header(TOKEN_HEADER, &self.token)
            .send_json(body)?;
        parse_optional(response.body_mut().read_to_string()?)
    }

    fn put(&self, path: &str, body: &impl Serialize) -> Result<()> {
        self.agent
            .put(&self.url(path))
            .header(TOKEN_HEADER, &self.token)
            .send_json(body)?;
        Ok(())
    }
}

fn normalize_address(address: &str) -> Result<String> {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(Error::InvalidAddress(address.to_string()))
    }
}

/// Lookup failures for tokens that disappeared after being listed
fn is_stale_accessor(err: &Error) -> bool {
    matches!(err.status(), Some(400 | 403 | 404))
}

/// Parse a body that may be empty (204 No Content)
fn parse_optional<T: DeserializeOwned>(body: String) -> Result<Option<T>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&body)?))
}
