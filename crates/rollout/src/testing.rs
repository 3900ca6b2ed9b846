//! Recording collaborators for tests

use crate::context::{
    Activator, Builder, HealthChecker, ProgressCallback, SecretService, Transport,
};
use crate::error::{Error, Result};
use crate::types::{ActivationMode, DynamicCredential, Host, Secret, SudoPassword};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const ARTIFACT: &str = "/nix/store/0000000000000000000000000000000-morph";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Build {
        hosts: Vec<String>,
    },
    Push {
        host: String,
        paths: Vec<PathBuf>,
    },
    UploadSecret {
        host: String,
        source: PathBuf,
        destination: PathBuf,
        owner: String,
        permissions: String,
        contents: Option<String>,
        password: String,
    },
    Activate {
        host: String,
        system: PathBuf,
        mode: ActivationMode,
        password: String,
    },
    HealthCheck {
        host: String,
        timeout: u64,
    },
    Authenticate(String),
    Configure,
    Rekey(String),
}

impl Call {
    /// Host a per-host call was made for
    pub fn host(&self) -> Option<&str> {
        match self {
            Call::Push { host, .. }
            | Call::UploadSecret { host, .. }
            | Call::Activate { host, .. }
            | Call::HealthCheck { host, .. }
            | Call::Rekey(host) => Some(host),
            _ => None,
        }
    }
}

/// Shared, ordered log of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Call>>>);

impl Journal {
    pub fn record(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| predicate(c)).count()
    }

    pub fn calls_for(&self, host: &str) -> Vec<Call> {
        self.0
            .borrow()
            .iter()
            .filter(|c| c.host() == Some(host))
            .cloned()
            .collect()
    }
}

fn host_set(hosts: &[&str]) -> HashSet<String> {
    hosts.iter().map(|h| (*h).to_string()).collect()
}

pub struct MockBuilder {
    journal: Journal,
    fail: bool,
}

impl MockBuilder {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Builder for MockBuilder {
    fn build(&self, hosts: &[Host]) -> Result<PathBuf> {
        self.journal.record(Call::Build {
            hosts: hosts.iter().map(|h| h.name.clone()).collect(),
        });
        if self.fail {
            return Err(Error::Build {
                message: "evaluation aborted".into(),
            });
        }
        Ok(PathBuf::from(ARTIFACT))
    }

    fn paths_to_push(&self, host: &Host, artifact: &Path) -> Result<Vec<PathBuf>> {
        Ok(vec![self.system_path(host, artifact)?])
    }

    fn system_path(&self, host: &Host, artifact: &Path) -> Result<PathBuf> {
        Ok(artifact.join(&host.name))
    }
}

pub struct MockTransport {
    journal: Journal,
    failing_push: HashSet<String>,
    failing_upload: HashSet<String>,
}

impl MockTransport {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            failing_push: HashSet::new(),
            failing_upload: HashSet::new(),
        }
    }

    pub fn failing_push_on(mut self, host: &str) -> Self {
        self.failing_push.insert(host.to_string());
        self
    }

    pub fn failing_upload_on(mut self, host: &str) -> Self {
        self.failing_upload.insert(host.to_string());
        self
    }
}

impl Transport for MockTransport {
    fn push(&self, host: &Host, paths: &[PathBuf]) -> Result<()> {
        self.journal.record(Call::Push {
            host: host.name.clone(),
            paths: paths.to_vec(),
        });
        if self.failing_push.contains(&host.name) {
            return Err(Error::Transfer {
                host: host.name.clone(),
                message: "connection refused".into(),
            });
        }
        Ok(())
    }

    fn upload_secret(
        &self,
        host: &Host,
        sudo_password: &SudoPassword,
        secret: &Secret,
        base_dir: &Path,
    ) -> Result<()> {
        let source = secret.resolve_source(base_dir);
        self.journal.record(Call::UploadSecret {
            host: host.name.clone(),
            contents: std::fs::read_to_string(&source).ok(),
            source,
            destination: secret.destination.clone(),
            owner: secret.owner.to_string(),
            permissions: secret.permissions.clone(),
            password: sudo_password.as_str().to_string(),
        });
        if self.failing_upload.contains(&host.name) {
            return Err(Error::Upload {
                host: host.name.clone(),
                secret: secret.destination.display().to_string(),
                message: "scp exited with 1".into(),
            });
        }
        Ok(())
    }
}

pub struct MockActivator {
    journal: Journal,
    failing: HashSet<String>,
}

impl MockActivator {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, host: &str) -> Self {
        self.failing.insert(host.to_string());
        self
    }
}

impl Activator for MockActivator {
    fn activate(
        &self,
        host: &Host,
        system_path: &Path,
        mode: ActivationMode,
        sudo_password: &SudoPassword,
    ) -> Result<()> {
        self.journal.record(Call::Activate {
            host: host.name.clone(),
            system: system_path.to_path_buf(),
            mode,
            password: sudo_password.as_str().to_string(),
        });
        if self.failing.contains(&host.name) {
            return Err(Error::Activation {
                host: host.name.clone(),
                mode,
                message: "switch-to-configuration exited with 4".into(),
            });
        }
        Ok(())
    }
}

pub struct MockHealth {
    journal: Journal,
    failing: HashSet<String>,
}

impl MockHealth {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, hosts: &[&str]) -> Self {
        self.failing = host_set(hosts);
        self
    }
}

impl HealthChecker for MockHealth {
    fn run_health_checks(&self, host: &Host, timeout_secs: u64) -> Result<()> {
        self.journal.record(Call::HealthCheck {
            host: host.name.clone(),
            timeout: timeout_secs,
        });
        if self.failing.contains(&host.name) {
            return Err(Error::HealthCheck {
                host: host.name.clone(),
                failed: vec!["http :80/health".into()],
            });
        }
        Ok(())
    }
}

pub struct MockSecretService {
    journal: Journal,
    auth_failures_left: Cell<usize>,
    fail_configure: bool,
    fail_rekey: bool,
    rekeys: Cell<usize>,
}

impl MockSecretService {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            auth_failures_left: Cell::new(0),
            fail_configure: false,
            fail_rekey: false,
            rekeys: Cell::new(0),
        }
    }

    /// Fail the first `n` authentication attempts
    pub fn failing_auth(self, n: usize) -> Self {
        self.auth_failures_left.set(n);
        self
    }

    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    pub fn failing_rekey(mut self) -> Self {
        self.fail_rekey = true;
        self
    }
}

impl SecretService for MockSecretService {
    type Session = ();

    fn authenticate(&self, address: &str, _token: &str) -> Result<()> {
        self.journal.record(Call::Authenticate(address.to_string()));
        let left = self.auth_failures_left.get();
        if left > 0 {
            self.auth_failures_left.set(left - 1);
            return Err(Error::Auth {
                message: "permission denied".into(),
            });
        }
        Ok(())
    }

    fn configure(&self, _session: &()) -> Result<()> {
        self.journal.record(Call::Configure);
        if self.fail_configure {
            return Err(Error::Configure {
                message: "403 Forbidden".into(),
            });
        }
        Ok(())
    }

    fn rekey(&self, _session: &(), host: &Host) -> Result<DynamicCredential> {
        self.journal.record(Call::Rekey(host.name.clone()));
        if self.fail_rekey {
            return Err(Error::Rekey {
                host: host.name.clone(),
                message: "500 Internal Server Error".into(),
            });
        }
        let n = self.rekeys.get() + 1;
        self.rekeys.set(n);
        Ok(DynamicCredential {
            accessor: format!("accessor-{}-{n}", host.name),
            token: format!("token-{}-{n}", host.name),
        })
    }
}

/// Progress callback that keeps what it was told
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub warnings: Vec<String>,
    pub secrets: Vec<(String, u64)>,
    pub rekeyed: Vec<String>,
    pub done: Vec<String>,
    pub health: Vec<(String, bool)>,
}

impl ProgressCallback for RecordingProgress {
    fn on_secret_start(&mut self, name: &str, size: u64) {
        self.secrets.push((name.to_string(), size));
    }

    fn on_credential_rekeyed(&mut self, host: &Host) {
        self.rekeyed.push(host.name.clone());
    }

    fn on_health_check_complete(&mut self, host: &Host, result: &Result<()>) {
        self.health.push((host.name.clone(), result.is_ok()));
    }

    fn on_host_done(&mut self, host: &Host) {
        self.done.push(host.name.clone());
    }

    fn on_warning(&mut self, error: &Error) {
        self.warnings.push(error.to_string());
    }
}
