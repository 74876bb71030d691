//! Run aggregation and rendering.

use crate::types::{TestResult, TestStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Name of the on-demand operation, pointed at from boot output.
pub const DIAGNOSTIC_OPERATION: &str = "run_smoke_tests";

/// Outcome of one orchestration run. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmokeTestReport {
    pub total_servers: usize,
    pub tested_servers: usize,
    pub passed_tests: usize,
    /// Includes `timeout` results.
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub timed_out_tests: usize,
    /// Checks planned for the tested servers, ignoring fail-fast.
    pub expected_tests: usize,
    /// Results produced by checks that actually ran.
    pub completed_tests: usize,
    /// The global deadline fired before every server finished.
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incomplete_servers: Vec<String>,
    #[serde(rename = "total_duration_ms", with = "crate::serde_duration")]
    pub total_duration: Duration,
    pub results: Vec<TestResult>,
    pub critical_failures: Vec<TestResult>,
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Run facts the orchestrator knows beyond the results themselves.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_servers: usize,
    pub tested_servers: usize,
    pub expected_tests: usize,
    pub completed_tests: usize,
    pub timed_out: bool,
    pub incomplete_servers: Vec<String>,
    pub warnings: Vec<String>,
    pub total_duration: Duration,
    pub started_at: Option<DateTime<Utc>>,
}

impl SmokeTestReport {
    /// Tallies `results` by status. Every result lands in exactly one bucket.
    pub fn from_results(results: Vec<TestResult>, summary: RunSummary) -> Self {
        let mut passed_tests = 0;
        let mut failed_tests = 0;
        let mut skipped_tests = 0;
        let mut timed_out_tests = 0;

        for result in &results {
            match result.status {
                TestStatus::Pass => passed_tests += 1,
                TestStatus::Fail => failed_tests += 1,
                TestStatus::Timeout => {
                    failed_tests += 1;
                    timed_out_tests += 1;
                }
                TestStatus::Skip => skipped_tests += 1,
            }
        }

        let critical_failures = results
            .iter()
            .filter(|result| result.is_critical())
            .cloned()
            .collect();

        Self {
            total_servers: summary.total_servers,
            tested_servers: summary.tested_servers,
            passed_tests,
            failed_tests,
            skipped_tests,
            timed_out_tests,
            expected_tests: summary.expected_tests,
            completed_tests: summary.completed_tests,
            timed_out: summary.timed_out,
            incomplete_servers: summary.incomplete_servers,
            total_duration: summary.total_duration,
            results,
            critical_failures,
            warnings: summary.warnings,
            timestamp: summary.started_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed_tests > 0
    }

    /// Planned checks that never produced a result, whether cut off by the
    /// deadline or short-circuited by fail-fast.
    pub fn missing_tests(&self) -> usize {
        self.expected_tests.saturating_sub(self.completed_tests)
    }

    pub fn results_for<'a>(&'a self, server: &'a str) -> impl Iterator<Item = &'a TestResult> + 'a {
        self.results
            .iter()
            .filter(move |result| result.server_name == server)
    }
}

fn status_tag(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Pass => "OK",
        TestStatus::Fail => "FAIL",
        TestStatus::Skip => "SKIP",
        TestStatus::Timeout => "TIME",
    }
}

/// Multi-line human summary of a run.
pub fn render_text(report: &SmokeTestReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Smoke tests: {} passed, {} failed, {} skipped ({} of {} servers tested, {}ms)",
        report.passed_tests,
        report.failed_tests,
        report.skipped_tests,
        report.tested_servers,
        report.total_servers,
        report.total_duration.as_millis()
    );

    if report.results.is_empty() {
        out.push_str("\nNo checks were executed.\n");
    } else {
        out.push('\n');
    }

    for result in &report.results {
        let _ = write!(
            out,
            "  {:<4} {} [{}] {}",
            status_tag(result.status),
            result.server_name,
            result.test_type,
            result.test_name
        );
        match (&result.error_message, &result.details) {
            (Some(message), _) => {
                let _ = write!(out, ": {message}");
            }
            (None, Some(details)) if result.status == TestStatus::Skip => {
                let _ = write!(out, " ({details})");
            }
            _ => {}
        }
        out.push('\n');
        if result.status.is_failure()
            && let Some(fix) = &result.fix_suggestion
        {
            let _ = writeln!(out, "       fix: {fix}");
        }
    }

    if !report.critical_failures.is_empty() {
        let _ = writeln!(
            out,
            "\n{} critical configuration failure(s).",
            report.critical_failures.len()
        );
    }

    if report.timed_out {
        let _ = writeln!(
            out,
            "\nRun timed out: {} of {} planned checks produced no result.",
            report.missing_tests(),
            report.expected_tests
        );
        if !report.incomplete_servers.is_empty() {
            let _ = writeln!(out, "Incomplete: {}", report.incomplete_servers.join(", "));
        }
    }

    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }

    out
}

/// Compact operator-facing lines for the boot path. Empty when nothing
/// critical failed and the run completed.
pub fn render_boot_summary(report: &SmokeTestReport) -> String {
    let mut out = String::new();

    for failure in &report.critical_failures {
        let message = failure
            .error_message
            .as_deref()
            .unwrap_or("configuration check failed");
        let _ = writeln!(out, "{}: {message}", failure.server_name);
        if let Some(fix) = &failure.fix_suggestion {
            let _ = writeln!(out, "  {fix}");
        }
    }

    if report.timed_out {
        let _ = writeln!(
            out,
            "smoke tests timed out before finishing: {}",
            report.incomplete_servers.join(", ")
        );
    }

    if !out.is_empty() {
        let _ = writeln!(out, "Run {DIAGNOSTIC_OPERATION} for full diagnostics.");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckOutcome, CheckTimer, TestType};

    fn result(server: &str, test_type: TestType, status: TestStatus) -> TestResult {
        let outcome = match status {
            TestStatus::Pass => CheckOutcome::pass("ok"),
            TestStatus::Fail => {
                CheckOutcome::fail(format!("{server} broke"), Some(format!("fix {server}")))
            }
            TestStatus::Skip => CheckOutcome::skip("not applicable"),
            TestStatus::Timeout => CheckOutcome::timeout(Duration::from_millis(100), None),
        };
        TestResult::from_outcome(server, test_type, "check", &CheckTimer::start(), outcome)
    }

    fn report(results: Vec<TestResult>) -> SmokeTestReport {
        SmokeTestReport::from_results(
            results,
            RunSummary {
                total_servers: 3,
                tested_servers: 2,
                expected_tests: 5,
                completed_tests: 1,
                ..RunSummary::default()
            },
        )
    }

    #[test]
    fn tally_covers_every_result_once() {
        let report = report(vec![
            result("a", TestType::Config, TestStatus::Pass),
            result("a", TestType::Connectivity, TestStatus::Timeout),
            result("b", TestType::Config, TestStatus::Fail),
            result("b", TestType::Health, TestStatus::Fail),
            result("c", TestType::Config, TestStatus::Skip),
        ]);

        assert_eq!(report.passed_tests, 1);
        assert_eq!(report.failed_tests, 3);
        assert_eq!(report.timed_out_tests, 1);
        assert_eq!(report.skipped_tests, 1);
        assert_eq!(
            report.passed_tests + report.failed_tests + report.skipped_tests,
            report.results.len()
        );
    }

    #[test]
    fn critical_failures_are_config_failures_only() {
        let report = report(vec![
            result("a", TestType::Config, TestStatus::Fail),
            result("a", TestType::Connectivity, TestStatus::Fail),
            result("b", TestType::Config, TestStatus::Timeout),
        ]);

        assert_eq!(report.critical_failures.len(), 1);
        assert_eq!(report.critical_failures[0].server_name, "a");
        assert_eq!(report.critical_failures[0].test_type, TestType::Config);
    }

    #[test]
    fn serializes_millis_and_rfc3339() {
        let mut report = report(vec![result("a", TestType::Config, TestStatus::Pass)]);
        report.total_duration = Duration::from_millis(1234);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total_duration_ms"], 1234);
        assert_eq!(value["expected_tests"], 5);
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
        assert!(value.get("incomplete_servers").is_none());
    }

    #[test]
    fn text_rendering_lists_results_and_fixes() {
        let text = render_text(&report(vec![
            result("a", TestType::Config, TestStatus::Pass),
            result("b", TestType::Config, TestStatus::Fail),
        ]));

        assert!(text.starts_with("Smoke tests: 1 passed, 1 failed, 0 skipped"));
        assert!(text.contains("OK   a [config] check"));
        assert!(text.contains("FAIL b [config] check: b broke"));
        assert!(text.contains("fix: fix b"));
        assert!(text.contains("1 critical configuration failure(s)."));
        assert!(!text.contains("timed out"));
    }

    #[test]
    fn timed_out_run_is_rendered_distinctly() {
        let mut report = report(vec![result("a", TestType::Config, TestStatus::Pass)]);
        report.timed_out = true;
        report.incomplete_servers = vec!["slow".to_string()];

        let text = render_text(&report);
        assert!(text.contains("Run timed out: 4 of 5 planned checks produced no result."));
        assert!(text.contains("Incomplete: slow"));

        let boot = render_boot_summary(&report);
        assert!(boot.contains("timed out before finishing: slow"));
    }

    #[test]
    fn boot_summary_is_silent_on_success() {
        let report = report(vec![
            result("a", TestType::Config, TestStatus::Pass),
            result("a", TestType::Connectivity, TestStatus::Fail),
        ]);
        assert!(render_boot_summary(&report).is_empty());
    }

    #[test]
    fn boot_summary_lists_critical_failures_with_fix() {
        let report = report(vec![result("openai", TestType::Config, TestStatus::Fail)]);
        let summary = render_boot_summary(&report);

        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "openai: openai broke");
        assert_eq!(lines[1], "  fix openai");
        assert_eq!(lines[2], "Run run_smoke_tests for full diagnostics.");
    }
}
