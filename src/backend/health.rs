//! Command and HTTP health checks
//!
//! Every check is attempted right away and then every `period` seconds
//! until it passes. The host is healthy once all of its checks have
//! passed; with a timeout, checks still failing at the deadline are
//! reported. A single attempt never outlives its own `timeout` or the
//! host deadline.

use super::SshOptions;
use crate::runner::{self, shell_quote};
use rollout::{CmdHealthCheck, Error, HealthChecker, Host, HttpHealthCheck, Result};
use std::thread;
use std::time::{Duration, Instant};
use ureq::tls::TlsConfig;

pub struct NetworkHealthChecker {
    ssh: SshOptions,
    program: String,
    program_args: Vec<String>,
}

enum Probe<'a> {
    Cmd(&'a CmdHealthCheck),
    Http(&'a HttpHealthCheck),
}

impl NetworkHealthChecker {
    pub fn new(ssh: SshOptions) -> Self {
        Self {
            ssh,
            program: "ssh".to_string(),
            program_args: Vec::new(),
        }
    }

    /// Run command checks through `program` instead of ssh
    #[cfg(test)]
    fn with_program(mut self, program: &str, args: &[&str]) -> Self {
        self.program = program.to_string();
        self.program_args = args.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Run one attempt, abandoning it after the check's own timeout or
    /// once `remaining` runs out, whichever comes first
    fn probe(&self, host: &Host, probe: &Probe<'_>, remaining: Option<Duration>) -> bool {
        let budget = attempt_budget(probe, remaining);
        let passed = match probe {
            Probe::Cmd(check) => self.run_cmd_check(host, check, budget),
            Probe::Http(check) => run_http_check(host, check, budget),
        };
        log::debug!(
            "Health check '{}' on {}: {}",
            describe(host, probe),
            host.hostname(),
            if passed { "passed" } else { "failed" }
        );
        passed
    }

    fn run_cmd_check(&self, host: &Host, check: &CmdHealthCheck, budget: Duration) -> bool {
        let mut args = self.program_args.clone();
        args.extend(
            self.ssh
                .ssh_args_with_timeout(host, &command_line(check), check.timeout),
        );
        runner::run_quiet_timeout(&self.program, &args, budget)
    }
}

impl HealthChecker for NetworkHealthChecker {
    fn run_health_checks(&self, host: &Host, timeout_secs: u64) -> Result<()> {
        let checks: Vec<(Probe<'_>, String, Duration)> = host
            .health_checks
            .cmd
            .iter()
            .map(|c| (Probe::Cmd(c), c.period))
            .chain(host.health_checks.http.iter().map(|c| (Probe::Http(c), c.period)))
            .map(|(probe, period)| {
                let description = describe(host, &probe);
                (probe, description, Duration::from_secs(period.max(1)))
            })
            .collect();

        let deadline =
            (timeout_secs > 0).then(|| Instant::now() + Duration::from_secs(timeout_secs));

        poll_checks(
            checks,
            deadline,
            |probe, remaining| self.probe(host, probe, remaining),
            thread::sleep,
        )
        .map_err(|failed| Error::HealthCheck {
            host: host.hostname().to_string(),
            failed,
        })
    }
}

fn attempt_budget(probe: &Probe<'_>, remaining: Option<Duration>) -> Duration {
    let timeout = match probe {
        Probe::Cmd(check) => check.timeout,
        Probe::Http(check) => check.timeout,
    };
    let budget = Duration::from_secs(timeout.max(1));
    remaining.map_or(budget, |r| budget.min(r))
}

fn describe(host: &Host, probe: &Probe<'_>) -> String {
    match probe {
        Probe::Cmd(check) if check.description.is_empty() => command_line(check),
        Probe::Http(check) if check.description.is_empty() => check.url(host),
        Probe::Cmd(check) => check.description.clone(),
        Probe::Http(check) => check.description.clone(),
    }
}

fn command_line(check: &CmdHealthCheck) -> String {
    check
        .cmd
        .iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn http_agent(check: &HttpHealthCheck, budget: Duration) -> ureq::Agent {
    let tls = TlsConfig::builder()
        .disable_verification(check.insecure_ssl)
        .build();
    ureq::Agent::config_builder()
        .timeout_global(Some(budget))
        .tls_config(tls)
        .http_status_as_error(false)
        .build()
        .into()
}

/// Any 2xx response passes
fn run_http_check(host: &Host, check: &HttpHealthCheck, budget: Duration) -> bool {
    let url = check.url(host);
    let mut request = http_agent(check, budget).get(&url);
    for (name, value) in &check.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    match request.call() {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            log::debug!("GET {url}: {e}");
            false
        }
    }
}

struct Pending<T> {
    check: T,
    description: String,
    period: Duration,
    due: Instant,
}

/// Retry each check on its own period until all pass or `deadline` is hit.
///
/// `run` receives the time left before the deadline, if there is one.
/// Returns the descriptions of the checks still failing at the deadline.
fn poll_checks<T>(
    checks: Vec<(T, String, Duration)>,
    deadline: Option<Instant>,
    mut run: impl FnMut(&T, Option<Duration>) -> bool,
    mut sleep: impl FnMut(Duration),
) -> std::result::Result<(), Vec<String>> {
    let start = Instant::now();
    let mut pending: Vec<Pending<T>> = checks
        .into_iter()
        .map(|(check, description, period)| Pending {
            check,
            description,
            period,
            due: start,
        })
        .collect();

    loop {
        let now = Instant::now();
        pending.retain_mut(|p| {
            if p.due > now {
                return true;
            }
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if run(&p.check, remaining) {
                return false;
            }
            p.due = Instant::now() + p.period;
            true
        });

        if pending.is_empty() {
            return Ok(());
        }

        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            return Err(pending.into_iter().map(|p| p.description).collect());
        }

        let mut wake = pending.iter().map(|p| p.due).min().unwrap_or(now);
        if let Some(d) = deadline {
            wake = wake.min(d);
        }
        sleep(wake.saturating_duration_since(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    fn http_check(port: u16) -> HttpHealthCheck {
        HttpHealthCheck {
            description: String::new(),
            scheme: "http".into(),
            host: Some("127.0.0.1".into()),
            port,
            path: "/health".into(),
            headers: BTreeMap::from([("X-Probe".to_string(), "morph".to_string())]),
            insecure_ssl: false,
            period: 1,
            timeout: 5,
        }
    }

    /// Serve one request with the given status line, returning the request head
    fn serve_once(status: &'static str) -> (u16, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap();
            let response =
                format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (port, handle)
    }

    #[test]
    fn test_poll_retries_until_pass() {
        let mut attempts = 0;
        let result = poll_checks(
            vec![("flaky", "flaky".to_string(), Duration::ZERO)],
            None,
            |_, _| {
                attempts += 1;
                attempts >= 3
            },
            |_| {},
        );
        assert!(result.is_ok());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_poll_reports_failures_at_deadline() {
        let result = poll_checks(
            vec![
                ("ok", "ok".to_string(), Duration::ZERO),
                ("bad", "bad".to_string(), Duration::ZERO),
            ],
            Some(Instant::now()),
            |name, _| *name == "ok",
            |_| {},
        );
        assert_eq!(result.unwrap_err(), vec!["bad".to_string()]);
    }

    #[test]
    fn test_poll_sleeps_no_longer_than_deadline() {
        let deadline = Instant::now() + Duration::from_millis(20);
        let mut slept = Vec::new();
        let result = poll_checks(
            vec![((), "never".to_string(), Duration::from_secs(60))],
            Some(deadline),
            |_, _| false,
            |d| {
                slept.push(d);
                thread::sleep(d);
            },
        );
        assert!(result.is_err());
        assert!(slept.iter().all(|d| *d <= Duration::from_millis(20)));
    }

    #[test]
    fn test_poll_without_checks_passes() {
        let result = poll_checks::<()>(Vec::new(), Some(Instant::now()), |_, _| false, |_| {});
        assert!(result.is_ok());
    }

    #[test]
    fn test_describe_falls_back() {
        let host = Host::new("web01", "web01.example.net");
        let cmd = CmdHealthCheck {
            description: String::new(),
            cmd: vec!["systemctl".into(), "is-active".into(), "my app".into()],
            period: 1,
            timeout: 1,
        };
        assert_eq!(
            describe(&host, &Probe::Cmd(&cmd)),
            "systemctl is-active 'my app'"
        );

        let mut http = http_check(8080);
        http.host = None;
        assert_eq!(
            describe(&host, &Probe::Http(&http)),
            "http://web01.example.net:8080/health"
        );
        http.description = "app".into();
        assert_eq!(describe(&host, &Probe::Http(&http)), "app");
    }

    #[test]
    fn test_http_check_passes_on_2xx_with_headers() {
        let (port, server) = serve_once("204 No Content");
        let host = Host::new("web01", "unused.invalid");

        assert!(run_http_check(&host, &http_check(port), Duration::from_secs(5)));

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /health "));
        assert!(request.to_ascii_lowercase().contains("x-probe: morph"));
    }

    #[test]
    fn test_http_check_fails_on_5xx() {
        let (port, server) = serve_once("503 Service Unavailable");
        let host = Host::new("web01", "unused.invalid");

        assert!(!run_http_check(&host, &http_check(port), Duration::from_secs(5)));
        server.join().unwrap();
    }

    #[test]
    fn test_checker_reports_failing_host() {
        let (port, server) = serve_once("500 Internal Server Error");
        let mut host = Host::new("web01", "unused.invalid");
        let mut check = http_check(port);
        check.description = "status page".into();
        host.health_checks.http.push(check);

        let checker = NetworkHealthChecker::new(SshOptions::default());
        let err = checker.run_health_checks(&host, 1).unwrap_err();
        server.join().unwrap();

        match err {
            Error::HealthCheck { host, failed } => {
                assert_eq!(host, "web01");
                assert_eq!(failed, vec!["status page".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    fn hanging_cmd_check(timeout: u64) -> CmdHealthCheck {
        CmdHealthCheck {
            description: "hangs".into(),
            cmd: vec!["systemctl".into(), "is-active".into(), "app".into()],
            period: 1,
            timeout,
        }
    }

    /// Stands in for ssh with a remote command that never returns
    fn hanging_checker() -> NetworkHealthChecker {
        NetworkHealthChecker::new(SshOptions::default())
            .with_program("sh", &["-c", "exec sleep 15"])
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_cmd_check_stays_within_host_timeout() {
        let mut host = Host::new("web01", "web01.example.net");
        host.health_checks.cmd.push(hanging_cmd_check(1));

        let started = Instant::now();
        let err = hanging_checker().run_health_checks(&host, 2).unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
        match err {
            Error::HealthCheck { failed, .. } => assert_eq!(failed, vec!["hangs".to_string()]),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_host_deadline_cuts_long_cmd_check_timeout() {
        let mut host = Host::new("web01", "web01.example.net");
        host.health_checks.cmd.push(hanging_cmd_check(60));

        let started = Instant::now();
        assert!(hanging_checker().run_health_checks(&host, 1).is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_attempt_budget() {
        let check = hanging_cmd_check(10);
        let probe = Probe::Cmd(&check);
        assert_eq!(attempt_budget(&probe, None), Duration::from_secs(10));
        assert_eq!(
            attempt_budget(&probe, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );

        let instant = hanging_cmd_check(0);
        assert_eq!(
            attempt_budget(&Probe::Cmd(&instant), None),
            Duration::from_secs(1)
        );
    }
}
