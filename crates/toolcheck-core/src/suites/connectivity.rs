//! Network reachability checks: HTTP status, TCP connect, container state.
//!
//! Every probe runs under its own deadline. A probe that outlives it is
//! reported as `timeout`, distinct from a probe that got a definite negative
//! answer (`fail`).

use super::{SuiteOutcome, TestSuite};
use crate::spec::{ConnectivityCheck, ConnectivityProbe, HttpMethod};
use crate::types::{CheckOutcome, CheckTimer, ResultSink, TestResult, TestType};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::debug;

const MAX_TEST_NAME_ENDPOINT: usize = 50;

/// Why a probe did not pass.
#[derive(Debug)]
enum ProbeError {
    /// Definite negative answer: refused, wrong status, container down.
    Failed(String),
    /// The probe's own transport gave up on time.
    TimedOut,
    /// The primitive needed to probe is not available on this host.
    Unavailable(String),
}

pub struct ConnectivityTestSuite {
    server: String,
    checks: Vec<ConnectivityCheck>,
    enabled: bool,
    http: reqwest::Client,
    default_timeout: Duration,
}

impl ConnectivityTestSuite {
    pub fn new(
        server: impl Into<String>,
        checks: Vec<ConnectivityCheck>,
        enabled: bool,
        http: reqwest::Client,
        default_timeout: Duration,
    ) -> Self {
        Self {
            server: server.into(),
            checks,
            enabled,
            http,
            default_timeout,
        }
    }

    async fn evaluate(&self, check: &ConnectivityCheck) -> CheckOutcome {
        let timeout = check.timeout.unwrap_or(self.default_timeout);
        let endpoint = check.probe.endpoint();

        let probed = match tokio::time::timeout(timeout, self.probe(&check.probe, timeout)).await
        {
            Ok(probed) => probed,
            Err(_) => Err(ProbeError::TimedOut),
        };

        match probed {
            Ok(details) => CheckOutcome::pass(details),
            Err(ProbeError::Failed(details)) => {
                let message = check
                    .error_message
                    .clone()
                    .unwrap_or_else(|| default_failure_message(&check.probe));
                CheckOutcome::fail(message, check.fix_suggestion.clone()).with_details(details)
            }
            Err(ProbeError::TimedOut) => {
                CheckOutcome::timeout(timeout, check.fix_suggestion.clone()).with_details(format!(
                    "deadline exceeded: no answer from {endpoint} within {timeout:?} \
                     (slow or unreachable)"
                ))
            }
            Err(ProbeError::Unavailable(details)) => CheckOutcome::skip(details),
        }
    }

    async fn probe(&self, probe: &ConnectivityProbe, timeout: Duration) -> Result<String, ProbeError> {
        match probe {
            ConnectivityProbe::Http {
                endpoint,
                method,
                expected_status,
            } => self.probe_http(endpoint, method, expected_status, timeout).await,
            ConnectivityProbe::Tcp { endpoint } => probe_tcp(endpoint).await,
            ConnectivityProbe::Docker { endpoint } => probe_docker(endpoint).await,
        }
    }

    async fn probe_http(
        &self,
        endpoint: &str,
        method: &HttpMethod,
        expected_status: &[u16],
        timeout: Duration,
    ) -> Result<String, ProbeError> {
        let response = self
            .http
            .request(method.to_reqwest(), endpoint)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProbeError::TimedOut
                } else {
                    ProbeError::Failed(format!("request failed: {err}"))
                }
            })?;

        let status = response.status().as_u16();
        if status_accepted(status, expected_status) {
            Ok(format!(
                "HTTP {} to {endpoint} succeeded ({status})",
                method.as_str()
            ))
        } else if expected_status.is_empty() {
            Err(ProbeError::Failed(format!("unexpected status code: {status}")))
        } else {
            Err(ProbeError::Failed(format!(
                "unexpected status code: {status} (expected one of {expected_status:?})"
            )))
        }
    }
}

/// Without an explicit list, any 2xx/3xx answer or an auth challenge counts
/// as reachable.
fn status_accepted(status: u16, expected: &[u16]) -> bool {
    if expected.is_empty() {
        (200..400).contains(&status) || status == 401 || status == 403
    } else {
        expected.contains(&status)
    }
}

async fn probe_tcp(endpoint: &str) -> Result<String, ProbeError> {
    TcpStream::connect(endpoint)
        .await
        .map(|_| format!("TCP connect to {endpoint} succeeded"))
        .map_err(|err| ProbeError::Failed(format!("connect failed: {err}")))
}

async fn probe_docker(container: &str) -> Result<String, ProbeError> {
    let output = Command::new("docker")
        .args([
            "inspect",
            "--format",
            "{{.State.Status}} {{if .State.Health}}{{.State.Health.Status}}{{end}}",
            container,
        ])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ProbeError::Unavailable(
                    "docker CLI not found; container state was not checked".to_string(),
                )
            } else {
                ProbeError::Unavailable(format!("could not run docker inspect: {err}"))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Failed(format!(
            "docker inspect failed: {}",
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut fields = stdout.split_whitespace();
    let state = fields.next().unwrap_or("unknown");
    let health = fields.next();

    match (state, health) {
        ("running", None | Some("healthy")) => Ok(format!(
            "container {container} is running{}",
            health.map(|h| format!(" ({h})")).unwrap_or_default()
        )),
        (state, Some(health)) => Err(ProbeError::Failed(format!(
            "container {container} is {state} ({health})"
        ))),
        (state, None) => Err(ProbeError::Failed(format!(
            "container {container} is {state}"
        ))),
    }
}

fn default_failure_message(probe: &ConnectivityProbe) -> String {
    match probe {
        ConnectivityProbe::Http { endpoint, .. } => format!("HTTP check failed: {endpoint}"),
        ConnectivityProbe::Tcp { endpoint } => format!("TCP connect failed: {endpoint}"),
        ConnectivityProbe::Docker { endpoint } => {
            format!("Container {endpoint} is not running")
        }
    }
}

/// Turns an endpoint into a stable test-name fragment.
pub fn sanitize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);

    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TEST_NAME_ENDPOINT)
        .collect()
}

#[async_trait]
impl TestSuite for ConnectivityTestSuite {
    fn name(&self) -> String {
        format!("{}_connectivity", self.server)
    }

    fn test_type(&self) -> TestType {
        TestType::Connectivity
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn check_count(&self) -> usize {
        self.checks.len()
    }

    async fn run(&self, sink: &ResultSink) -> SuiteOutcome {
        let mut outcome = SuiteOutcome::default();
        for check in &self.checks {
            let timer = CheckTimer::start();
            let test_name = format!(
                "{}_{}",
                check.probe.kind(),
                sanitize_endpoint(check.probe.endpoint())
            );
            let result = TestResult::from_outcome(
                &self.server,
                TestType::Connectivity,
                test_name,
                &timer,
                self.evaluate(check).await,
            );
            debug!(
                server = %self.server,
                test = %result.test_name,
                status = %result.status,
                elapsed_ms = result.duration.as_millis() as u64,
                "connectivity check finished"
            );

            outcome.executed += 1;
            if sink.record(result).is_failure() {
                outcome.failed += 1;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TestStatus;
    use axum::Router;
    use axum::http::StatusCode;
    use tokio::net::TcpListener;

    /// Answers every request with `status` and an empty body.
    async fn spawn_http(status: u16) -> String {
        let status = StatusCode::from_u16(status).unwrap();
        let app = Router::new().fallback(move || async move { status });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/health")
    }

    fn http_check(endpoint: &str, expected_status: Vec<u16>) -> ConnectivityCheck {
        ConnectivityCheck {
            probe: ConnectivityProbe::Http {
                endpoint: endpoint.to_string(),
                method: HttpMethod::GET,
                expected_status,
            },
            error_message: Some("Server unreachable".to_string()),
            fix_suggestion: Some("Start the server".to_string()),
            timeout: None,
        }
    }

    fn suite(checks: Vec<ConnectivityCheck>, timeout: Duration) -> ConnectivityTestSuite {
        ConnectivityTestSuite::new("fetch", checks, true, reqwest::Client::new(), timeout)
    }

    #[test]
    fn sanitize_strips_scheme_and_truncates() {
        assert_eq!(
            sanitize_endpoint("https://api.example.com/v1?q=1"),
            "api.example.com_v1_q_1"
        );
        let long = format!("http://{}", "a".repeat(80));
        assert_eq!(sanitize_endpoint(&long).len(), 50);
    }

    #[test]
    fn default_status_policy_accepts_auth_challenges() {
        assert!(status_accepted(204, &[]));
        assert!(status_accepted(302, &[]));
        assert!(status_accepted(401, &[]));
        assert!(!status_accepted(500, &[]));
        assert!(status_accepted(401, &[200, 401]));
        assert!(!status_accepted(204, &[200, 401]));
    }

    #[tokio::test]
    async fn http_expected_status_passes() {
        let endpoint = spawn_http(200).await;
        let results = suite(
            vec![http_check(&endpoint, vec![200, 401])],
            Duration::from_secs(2),
        )
        .collect()
        .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, TestStatus::Pass);
        assert_eq!(results[0].test_type, TestType::Connectivity);
        assert!(results[0].test_name.starts_with("http_127.0.0.1_"));
    }

    #[tokio::test]
    async fn http_unexpected_status_fails_with_details() {
        let endpoint = spawn_http(503).await;
        let results = suite(vec![http_check(&endpoint, vec![200])], Duration::from_secs(2))
            .collect()
            .await;

        let result = &results[0];
        assert_eq!(result.status, TestStatus::Fail);
        assert_eq!(result.error_message.as_deref(), Some("Server unreachable"));
        assert_eq!(result.fix_suggestion.as_deref(), Some("Start the server"));
        assert!(result.details.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn unreachable_host_is_bounded_by_check_timeout() {
        let check = http_check("http://10.255.255.1:81/", vec![200]);
        let results = suite(vec![check], Duration::from_millis(100))
            .collect()
            .await;

        let result = &results[0];
        assert!(matches!(
            result.status,
            TestStatus::Fail | TestStatus::Timeout
        ));
        assert!(
            result.duration <= Duration::from_millis(500),
            "took {:?}",
            result.duration
        );
    }

    #[tokio::test]
    async fn tcp_refused_fails_and_open_port_passes() {
        let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_addr = open.local_addr().unwrap().to_string();

        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed_addr = closed.local_addr().unwrap().to_string();
        drop(closed);

        let checks = [open_addr, closed_addr]
            .into_iter()
            .map(|endpoint| ConnectivityCheck {
                probe: ConnectivityProbe::Tcp { endpoint },
                error_message: None,
                fix_suggestion: None,
                timeout: None,
            })
            .collect();

        let (sink, mut rx) = ResultSink::channel();
        let outcome = suite(checks, Duration::from_secs(1)).run(&sink).await;

        assert_eq!(outcome.executed, 2);
        assert_eq!(rx.recv().await.unwrap().status, TestStatus::Pass);
        let refused = rx.recv().await.unwrap();
        assert_eq!(refused.status, TestStatus::Fail);
        assert!(
            refused
                .error_message
                .as_deref()
                .unwrap()
                .starts_with("TCP connect failed")
        );
    }

    #[tokio::test]
    async fn docker_never_passes_without_evidence() {
        let check = ConnectivityCheck {
            probe: ConnectivityProbe::Docker {
                endpoint: "toolcheck-definitely-missing-container".to_string(),
            },
            error_message: None,
            fix_suggestion: None,
            timeout: Some(Duration::from_secs(5)),
        };

        let results = suite(vec![check], Duration::from_secs(5)).collect().await;
        assert_ne!(results[0].status, TestStatus::Pass);
        assert!(results[0].details.is_some());
    }
}
