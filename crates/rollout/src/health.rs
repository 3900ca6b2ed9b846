//! Health gate - run a host's checks and decide whether to continue

use crate::context::{HealthChecker, ProgressCallback};
use crate::error::{Error, Result};
use crate::types::Host;

/// Run a host's health checks within `timeout_secs` (`0` = no deadline)
pub fn gate(
    checker: &dyn HealthChecker,
    host: &Host,
    timeout_secs: u64,
    progress: &mut dyn ProgressCallback,
) -> Result<()> {
    progress.on_health_check_start(host);
    let result = checker.run_health_checks(host, timeout_secs);
    progress.on_health_check_complete(host, &result);
    result
}

/// Outcome of checking a set of hosts without gating
#[derive(Debug, Default)]
pub struct HealthReport {
    pub healthy: Vec<String>,
    pub unhealthy: Vec<(String, Error)>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.unhealthy.is_empty()
    }

    pub fn checked(&self) -> usize {
        self.healthy.len() + self.unhealthy.len()
    }
}

/// Check every host in order; failures are recorded, never fatal
pub fn check_fleet(
    checker: &dyn HealthChecker,
    hosts: &[Host],
    timeout_secs: u64,
    progress: &mut dyn ProgressCallback,
) -> HealthReport {
    let mut report = HealthReport::default();

    for host in hosts {
        match gate(checker, host, timeout_secs, progress) {
            Ok(()) => report.healthy.push(host.hostname().to_string()),
            Err(err) => {
                log::info!("{err}");
                report.unhealthy.push((host.hostname().to_string(), err));
            }
        }
    }

    report
}
