//! Error types for Vault operations.

use std::fmt;

/// Result type alias for Vault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of Vault errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Server unreachable or answering 5xx (transient).
    Network,
    /// Token rejected or lacking permission.
    Auth,
    /// Unexpected response body.
    Format,
    /// Rejected before any request was made.
    Input,
}

impl ErrorCategory {
    /// Whether this error category is typically transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Vault unreachable",
            Self::Auth => "Vault permission denied",
            Self::Format => "Unexpected Vault response",
            Self::Input => "Invalid request",
        }
    }

    /// Actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check VAULT_ADDR and that the server is unsealed",
            Self::Auth => "Check that VAULT_TOKEN is valid and may manage token roles and policies",
            Self::Format => "Check that VAULT_ADDR points at a Vault server",
            Self::Input => "Check the host name in the deployment",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur talking to Vault.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("Vault request failed: {message}")]
    Http {
        message: String,
        /// HTTP status code if the server answered.
        status: Option<u16>,
    },

    /// Response did not have the expected shape.
    #[error("invalid Vault response: {0}")]
    InvalidResponse(String),

    /// Host name cannot be used in a policy name.
    #[error("invalid host name for Vault policy: '{0}'")]
    InvalidHostName(String),

    /// Address is empty or not http(s).
    #[error("invalid Vault address: '{0}'")]
    InvalidAddress(String),
}

impl Error {
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// HTTP status code, when the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http {
                status: Some(401 | 403),
                ..
            } => ErrorCategory::Auth,
            Self::Http { .. } => ErrorCategory::Network,
            Self::InvalidResponse(_) => ErrorCategory::Format,
            Self::InvalidHostName(_) | Self::InvalidAddress(_) => ErrorCategory::Input,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
