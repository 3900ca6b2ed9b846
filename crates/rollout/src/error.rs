//! Error types for rollouts.
//!
//! Errors are categorized so the driver and the binary can decide, in one
//! place, whether a failure aborts the invocation, halts the rollout, or is
//! only worth a warning.

use crate::types::ActivationMode;
use std::path::PathBuf;
use thiserror::Error;

/// How a failure affects the invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Environment is unusable, nothing has started
    Startup,
    /// Inventory evaluation or build failed, no host was touched
    Evaluation,
    /// A per-host operation failed, the invocation aborts
    Fatal,
    /// Secret service interaction failed, the capability is skipped
    SecretService,
    /// A host failed its health checks, the rollout halts
    HealthGate,
}

impl ErrorCategory {
    /// Whether the rollout can carry on after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SecretService)
    }

    /// Whether this error terminates the invocation abnormally
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup | Self::Evaluation | Self::Fatal)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Startup => "Startup check failed",
            Self::Evaluation => "Evaluation failed",
            Self::Fatal => "Deployment failed",
            Self::SecretService => "Secret service unavailable",
            Self::HealthGate => "Health check failed",
        }
    }
}

/// Errors that can occur while selecting, building and rolling out hosts
#[derive(Debug, Error)]
pub enum Error {
    /// Required executables are not on PATH
    #[error("missing dependencies: {}", .0.join(", "))]
    MissingExecutables(Vec<String>),

    /// Host selection glob is malformed
    #[error("invalid host pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Inventory could not be evaluated
    #[error("failed to evaluate deployment: {message}")]
    Evaluation { message: String },

    /// Deployment artifact could not be built
    #[error("build failed: {message}")]
    Build { message: String },

    /// Secret source file does not exist
    #[error("secret source not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// Closure transfer to a host failed
    #[error("failed to push paths to {host}: {message}")]
    Transfer { host: String, message: String },

    /// Secret delivery to a host failed
    #[error("failed to upload secret '{secret}' to {host}: {message}")]
    Upload {
        host: String,
        secret: String,
        message: String,
    },

    /// Activating the configuration failed
    #[error("failed to run '{mode}' on {host}: {message}")]
    Activation {
        host: String,
        mode: ActivationMode,
        message: String,
    },

    /// One or more health checks did not pass in time
    #[error("health checks failed on {host}: {}", .failed.join(", "))]
    HealthCheck { host: String, failed: Vec<String> },

    /// Secret service address or token not provided
    #[error("secret service disabled: set {address_var} and {token_var} in the environment")]
    MissingCredentials {
        address_var: String,
        token_var: String,
    },

    /// Secret service rejected the credentials
    #[error("secret service authentication failed: {message}")]
    Auth { message: String },

    /// Secret service one-time configuration failed
    #[error("secret service configuration failed: {message}")]
    Configure { message: String },

    /// Credential rekey for a host failed
    #[error("failed to rekey credential for {host}: {message}")]
    Rekey { host: String, message: String },

    /// Interactive sudo password could not be read
    #[error("failed to read sudo password: {message}")]
    Password { message: String },

    /// Local filesystem error
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingExecutables(_) => ErrorCategory::Startup,
            Error::InvalidPattern { .. } | Error::Evaluation { .. } | Error::Build { .. } => {
                ErrorCategory::Evaluation
            }
            Error::MissingCredentials { .. }
            | Error::Auth { .. }
            | Error::Configure { .. }
            | Error::Rekey { .. } => ErrorCategory::SecretService,
            Error::HealthCheck { .. } => ErrorCategory::HealthGate,
            Error::NotFound { .. }
            | Error::Transfer { .. }
            | Error::Upload { .. }
            | Error::Activation { .. }
            | Error::Password { .. }
            | Error::Io { .. } => ErrorCategory::Fatal,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.category().is_recoverable()
    }

    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for rollout operations
pub type Result<T> = std::result::Result<T, Error>;
