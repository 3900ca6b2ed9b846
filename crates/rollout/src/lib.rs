//! # Rollout
//!
//! Sequential rollout of one built configuration to a fleet of hosts.
//!
//! ## Core Concepts
//!
//! - **Host**: an inventory entry with its secrets, health checks and
//!   dynamic credential settings
//! - **Selection**: hosts matching a name pattern, windowed by skip/every/limit
//! - **ActivationPlan**: which per-host steps a mode enables
//! - **Collaborators**: builder, transport, activator, health checker and
//!   secret service, all injected as traits
//!
//! ## Example
//!
//! ```ignore
//! use rollout::{select, SelectOptions, DeployOptions, Collaborators, deploy, NoProgress};
//!
//! let selection = select(inventory, &SelectOptions::default())?;
//! let outcome = deploy(
//!     &selection.hosts,
//!     &opts,
//!     &collaborators,
//!     || Ok(SudoPassword::empty()),
//!     &mut NoProgress,
//! )?;
//! if outcome.is_halted() {
//!     std::process::exit(3);
//! }
//! ```

pub mod context;
pub mod driver;
pub mod error;
pub mod health;
pub mod plan;
pub mod secrets;
pub mod select;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use context::{
    Activator, Builder, HealthChecker, NoProgress, ProgressCallback, SecretService, Transport,
};
pub use driver::{Collaborators, DeployOptions, RolloutContext, RolloutOutcome, deploy};
pub use error::{Error, ErrorCategory, Result};
pub use health::{HealthReport, check_fleet};
pub use plan::ActivationPlan;
pub use select::{HostPattern, SelectOptions, Selection, select};
pub use session::{CredentialSource, DEFAULT_ADDRESS_VAR, DEFAULT_TOKEN_VAR, SessionManager};
pub use types::{
    ActivationMode, CmdHealthCheck, DestinationFile, DynamicCredential,
    DynamicCredentialOptions, HealthChecks, Host, HttpHealthCheck, Owner, Secret, SudoPassword,
};
