//! Lazily established secret-service session
//!
//! The session is created on first use, from credentials found in the
//! environment, and reused for every later host. Failures are warnings:
//! without a session the rollout proceeds without dynamic credentials.

use crate::context::{ProgressCallback, SecretService};
use crate::error::Error;

/// Default environment variable holding the secret-service address
pub const DEFAULT_ADDRESS_VAR: &str = "VAULT_ADDR";

/// Default environment variable holding the secret-service root token
pub const DEFAULT_TOKEN_VAR: &str = "VAULT_TOKEN";

/// Address and token used to authenticate
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceCredentials {
    pub address: String,
    pub token: String,
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Where secret-service credentials come from
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Read from environment variables at first use
    Env {
        address_var: String,
        token_var: String,
    },
    /// Fixed values
    Static {
        address: Option<String>,
        token: Option<String>,
    },
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::env(DEFAULT_ADDRESS_VAR, DEFAULT_TOKEN_VAR)
    }
}

impl CredentialSource {
    pub fn env(address_var: impl Into<String>, token_var: impl Into<String>) -> Self {
        Self::Env {
            address_var: address_var.into(),
            token_var: token_var.into(),
        }
    }

    /// Resolve credentials, or the error explaining why they are missing
    pub fn resolve(&self) -> Result<ServiceCredentials, Error> {
        let (address, token) = match self {
            Self::Env {
                address_var,
                token_var,
            } => (std::env::var(address_var).ok(), std::env::var(token_var).ok()),
            Self::Static { address, token } => (address.clone(), token.clone()),
        };

        match (non_empty(address), non_empty(token)) {
            (Some(address), Some(token)) => Ok(ServiceCredentials { address, token }),
            _ => Err(self.missing()),
        }
    }

    fn missing(&self) -> Error {
        let (address_var, token_var) = match self {
            Self::Env {
                address_var,
                token_var,
            } => (address_var.clone(), token_var.clone()),
            Self::Static { .. } => (DEFAULT_ADDRESS_VAR.to_string(), DEFAULT_TOKEN_VAR.to_string()),
        };
        Error::MissingCredentials {
            address_var,
            token_var,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Get-or-create accessor for the secret-service session
pub struct SessionManager<'a, S: SecretService> {
    service: &'a S,
    source: CredentialSource,
    session: Option<S::Session>,
    attempts: usize,
}

impl<'a, S: SecretService> SessionManager<'a, S> {
    pub fn new(service: &'a S, source: CredentialSource) -> Self {
        Self {
            service,
            source,
            session: None,
            attempts: 0,
        }
    }

    /// The secret service this manager authenticates against
    pub fn service(&self) -> &'a S {
        self.service
    }

    /// Whether a session has been established
    pub fn is_established(&self) -> bool {
        self.session.is_some()
    }

    /// Number of times establishing a session was attempted
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Return the cached session, establishing it first if needed.
    ///
    /// While no session exists every call retries; once one exists it is
    /// returned as-is and never re-authenticated.
    pub fn ensure_session(&mut self, progress: &mut dyn ProgressCallback) -> Option<&S::Session> {
        if self.session.is_none() {
            self.attempts += 1;
            match self.establish() {
                Ok(session) => {
                    log::info!("Secret service session established");
                    self.session = Some(session);
                }
                Err(err) => {
                    log::warn!("{err}");
                    progress.on_warning(&err);
                }
            }
        }
        self.session.as_ref()
    }

    fn establish(&self) -> Result<S::Session, Error> {
        let credentials = self.source.resolve()?;
        log::debug!("Authenticating against {}", credentials.address);
        let session = self
            .service
            .authenticate(&credentials.address, &credentials.token)?;
        self.service.configure(&session)?;
        Ok(session)
    }
}
