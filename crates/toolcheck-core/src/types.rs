//! Result types shared by every check suite and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

/// Terminal outcome of a single executed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Timeout,
}

impl TestStatus {
    /// Whether this status counts against the server in aggregation.
    pub fn is_failure(self) -> bool {
        matches!(self, TestStatus::Fail | TestStatus::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Skip => "skip",
            TestStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check category, in the order the tiers run for one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Config,
    Connectivity,
    Health,
}

impl TestType {
    pub fn as_str(self) -> &'static str {
        match self {
            TestType::Config => "config",
            TestType::Connectivity => "connectivity",
            TestType::Health => "health",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluation outcome. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub server_name: String,
    pub test_type: TestType,
    pub test_name: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
    #[serde(rename = "duration_ms", with = "crate::serde_duration")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl TestResult {
    /// Builds a result from an outcome measured by `timer`.
    pub fn from_outcome(
        server_name: &str,
        test_type: TestType,
        test_name: impl Into<String>,
        timer: &CheckTimer,
        outcome: CheckOutcome,
    ) -> Self {
        Self {
            server_name: server_name.to_string(),
            test_type,
            test_name: test_name.into(),
            status: outcome.status,
            error_message: outcome.error_message,
            fix_suggestion: outcome.fix_suggestion,
            duration: timer.elapsed(),
            timestamp: timer.started_at(),
            details: outcome.details,
        }
    }

    /// A `skip` result that was decided without running anything.
    pub fn skipped(
        server_name: &str,
        test_type: TestType,
        test_name: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let timer = CheckTimer::start();
        Self::from_outcome(
            server_name,
            test_type,
            test_name,
            &timer,
            CheckOutcome::skip(details),
        )
    }

    pub fn is_critical(&self) -> bool {
        self.test_type == TestType::Config && self.status == TestStatus::Fail
    }
}

/// Wall-clock start plus a monotonic clock for the elapsed time.
#[derive(Debug, Clone, Copy)]
pub struct CheckTimer {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl CheckTimer {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// What a check decided, before it is stamped with identity and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub status: TestStatus,
    pub error_message: Option<String>,
    pub fix_suggestion: Option<String>,
    pub details: Option<String>,
}

impl CheckOutcome {
    pub fn pass(details: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Pass,
            error_message: None,
            fix_suggestion: None,
            details: Some(details.into()),
        }
    }

    pub fn fail(error_message: impl Into<String>, fix_suggestion: Option<String>) -> Self {
        Self {
            status: TestStatus::Fail,
            error_message: Some(error_message.into()),
            fix_suggestion,
            details: None,
        }
    }

    pub fn skip(details: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Skip,
            error_message: None,
            fix_suggestion: None,
            details: Some(details.into()),
        }
    }

    pub fn timeout(timeout: Duration, fix_suggestion: Option<String>) -> Self {
        Self {
            status: TestStatus::Timeout,
            error_message: Some(format!("Test timed out after {timeout:?}")),
            fix_suggestion,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Write end of the run's result collection.
///
/// Cloned into every server task; the orchestrator owns the only receiver.
#[derive(Debug, Clone)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<TestResult>,
}

impl ResultSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TestResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Records a result and returns its status.
    ///
    /// Once the collector stops accepting results the value is dropped.
    pub fn record(&self, result: TestResult) -> TestStatus {
        let status = result.status;
        if let Err(rejected) = self.tx.send(result) {
            debug!(
                server = %rejected.0.server_name,
                test = %rejected.0.test_name,
                "result collector closed, dropping late result"
            );
        }
        status
    }
}
