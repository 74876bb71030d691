//! Scheduling of per-server check pipelines.
//!
//! Each server gets one task that runs its tiers in order (config, then
//! connectivity, then health). Tasks run in parallel up to the policy's
//! concurrency cap. Results flow through a single channel owned by the run;
//! when the global deadline fires the channel is closed, in-flight tasks are
//! aborted and whatever was already recorded becomes the report.

use crate::policy::{OrchestratorConfig, TestLevels};
use crate::report::{RunSummary, SmokeTestReport};
use crate::spec_store::SpecStore;
use crate::suites::{
    CheckContext, ConfigTestSuite, ConnectivityTestSuite, HealthTestSuite, SuiteOutcome, TestSuite,
};
use crate::types::{ResultSink, TestResult, TestType};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const DISABLED_TEST_NAME: &str = "Smoke tests disabled";
pub const EXCLUDED_DETAILS: &str = "Server excluded from testing";

pub struct Orchestrator {
    config: OrchestratorConfig,
    store: Arc<SpecStore>,
    ctx: CheckContext,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, store: Arc<SpecStore>, ctx: CheckContext) -> Self {
        Self { config, store, ctx }
    }

    /// Runs every enabled tier for `servers` and aggregates the results.
    ///
    /// Never fails: check failures, load errors and the global deadline all
    /// end up in the returned report.
    pub async fn run_all(&self, servers: &[String]) -> SmokeTestReport {
        let started = Instant::now();
        let started_at = Utc::now();

        if !self.config.enabled {
            info!("smoke tests disabled by policy");
            let result = TestResult::skipped(
                &servers.join(","),
                TestType::Config,
                DISABLED_TEST_NAME,
                "Smoke tests are disabled in the policy",
            );
            return SmokeTestReport::from_results(
                vec![result],
                RunSummary {
                    total_servers: servers.len(),
                    total_duration: started.elapsed(),
                    started_at: Some(started_at),
                    ..RunSummary::default()
                },
            );
        }

        let deadline = run_deadline(self.config.global_timeout);
        let levels = self.config.test_levels;
        let (sink, mut rx) = ResultSink::channel();

        let mut warnings = Vec::new();
        let mut scheduled = Vec::new();
        let mut seen = HashSet::new();
        let mut expected_tests = 0;
        let mut excluded = 0;

        for server in servers {
            if !seen.insert(server.as_str()) {
                continue;
            }
            if self.config.is_excluded(server) {
                debug!(server = %server, "server excluded from testing");
                sink.record(TestResult::skipped(
                    server,
                    TestType::Config,
                    EXCLUDED_DETAILS,
                    EXCLUDED_DETAILS,
                ));
                excluded += 1;
                continue;
            }
            if let Some(err) = self.store.load_error(server) {
                warnings.push(format!("{server}: test specification failed to load: {err}"));
                continue;
            }

            match self.store.spec(server) {
                Some(spec) => {
                    let counts = spec.check_counts();
                    expected_tests += usize::from(levels.config) * counts.config
                        + usize::from(levels.connectivity) * counts.connectivity
                        + usize::from(levels.health) * counts.health;
                    if levels.health {
                        for cost in spec.cost_warnings() {
                            let warning = format!("{server}: health checks may incur cost: {cost}");
                            if !warnings.contains(&warning) {
                                warnings.push(warning);
                            }
                        }
                    }
                }
                None => debug!(server = %server, "no test specification, nothing to run"),
            }
            scheduled.push(server.clone());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.effective_concurrency()));
        let mut tasks = JoinSet::new();
        for server in &scheduled {
            let pipeline = self.pipeline(server, levels);
            let semaphore = Arc::clone(&semaphore);
            let sink = sink.clone();
            tasks.spawn(async move {
                // A closed semaphore only happens if the run is torn down.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return pipeline.server;
                };
                pipeline.run(&sink).await
            });
        }
        drop(sink);

        let mut completed = HashSet::new();
        let joined = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(server) => {
                        completed.insert(server);
                    }
                    Err(err) => warn!(error = %err, "server check task failed"),
                }
            }
        })
        .await;

        let timed_out = joined.is_err();
        if timed_out {
            tasks.abort_all();
            warn!(
                timeout_ms = self.config.global_timeout.as_millis(),
                "smoke test run hit the global timeout"
            );
        }

        rx.close();
        let mut results = Vec::new();
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }

        let incomplete_servers: Vec<String> = scheduled
            .iter()
            .filter(|server| !completed.contains(*server))
            .cloned()
            .collect();
        if !timed_out && !incomplete_servers.is_empty() {
            warnings.push(format!(
                "checks aborted unexpectedly for: {}",
                incomplete_servers.join(", ")
            ));
        }

        // Group by request order; within a server, results keep execution order.
        let order: HashMap<&str, usize> = servers
            .iter()
            .enumerate()
            .map(|(index, server)| (server.as_str(), index))
            .rev()
            .collect();
        results.sort_by_key(|result| {
            order
                .get(result.server_name.as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });

        let completed_tests = results.len() - excluded;
        let report = SmokeTestReport::from_results(
            results,
            RunSummary {
                total_servers: servers.len(),
                tested_servers: scheduled.len(),
                expected_tests,
                completed_tests,
                timed_out,
                incomplete_servers,
                warnings,
                total_duration: started.elapsed(),
                started_at: Some(started_at),
            },
        );

        for failure in &report.critical_failures {
            warn!(
                server = %failure.server_name,
                check = %failure.test_name,
                error = failure.error_message.as_deref().unwrap_or_default(),
                "critical configuration failure"
            );
        }
        info!(
            servers = report.tested_servers,
            passed = report.passed_tests,
            failed = report.failed_tests,
            skipped = report.skipped_tests,
            elapsed_ms = report.total_duration.as_millis(),
            timed_out = report.timed_out,
            "smoke test run finished"
        );

        report
    }

    fn pipeline(&self, server: &str, levels: TestLevels) -> ServerPipeline {
        let store = &self.store;
        let ctx = &self.ctx;
        ServerPipeline {
            server: server.to_string(),
            fail_fast: self.config.fail_fast,
            config: levels
                .config
                .then(|| store.config_tests(server, ctx))
                .flatten(),
            connectivity: levels
                .connectivity
                .then(|| store.connectivity_tests(server, ctx))
                .flatten(),
            health: levels
                .health
                .then(|| store.health_tests(server, ctx))
                .flatten(),
        }
    }
}

/// Deadlines past what `Instant` can represent are treated as "never".
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn run_deadline(timeout: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// One server's tiers, owned by its task.
struct ServerPipeline {
    server: String,
    fail_fast: bool,
    config: Option<ConfigTestSuite>,
    connectivity: Option<ConnectivityTestSuite>,
    health: Option<HealthTestSuite>,
}

impl ServerPipeline {
    async fn run(self, sink: &ResultSink) -> String {
        let outcome = run_suite(self.config.as_ref(), sink).await;
        if self.fail_fast && outcome.has_failures() {
            debug!(server = %self.server, "config failed, skipping remaining tiers");
            return self.server;
        }

        let outcome = run_suite(self.connectivity.as_ref(), sink).await;
        if self.fail_fast && outcome.has_failures() {
            debug!(server = %self.server, "connectivity failed, skipping health checks");
            return self.server;
        }

        run_suite(self.health.as_ref(), sink).await;
        self.server
    }
}

async fn run_suite<S: TestSuite>(suite: Option<&S>, sink: &ResultSink) -> SuiteOutcome {
    match suite {
        Some(suite) if suite.enabled() => {
            debug!(
                suite = %suite.name(),
                test_type = %suite.test_type(),
                checks = suite.check_count(),
                "running suite"
            );
            suite.run(sink).await
        }
        _ => SuiteOutcome::default(),
    }
}
