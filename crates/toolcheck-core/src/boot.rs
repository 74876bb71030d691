//! Boot-time smoke run.
//!
//! Runs once at process start under a short ceiling, prints only what an
//! operator must act on, and keeps the full report in the durable log.
//! Nothing here can fail the caller's startup.

use crate::orchestrator::Orchestrator;
use crate::policy::OrchestratorConfig;
use crate::registry::ServerRegistry;
use crate::report::{SmokeTestReport, render_boot_summary};
use crate::report_log::{ReportLog, RunTrigger};
use crate::spec_store::SpecStore;
use crate::suites::CheckContext;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Upper bound on boot-time runs, whatever the policy's global timeout.
pub const BOOT_TIMEOUT_CEILING: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSkipReason {
    Disabled,
    RunOnBootOff,
    EnvironmentOverride,
}

#[derive(Debug)]
pub enum BootOutcome {
    Skipped(BootSkipReason),
    Completed(SmokeTestReport),
}

pub struct BootCheck {
    config: OrchestratorConfig,
    store: Arc<SpecStore>,
    registry: Arc<dyn ServerRegistry>,
    ctx: Option<CheckContext>,
    skip_override: bool,
}

impl BootCheck {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<SpecStore>,
        registry: Arc<dyn ServerRegistry>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            ctx: None,
            skip_override: false,
        }
    }

    pub fn with_context(mut self, ctx: CheckContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Set from `TOOLCHECK_SKIP_SMOKE_TESTS` by the binary.
    pub fn with_skip_override(mut self, skip: bool) -> Self {
        self.skip_override = skip;
        self
    }

    fn skip_reason(&self) -> Option<BootSkipReason> {
        if self.skip_override {
            Some(BootSkipReason::EnvironmentOverride)
        } else if !self.config.enabled {
            Some(BootSkipReason::Disabled)
        } else if !self.config.run_on_boot {
            Some(BootSkipReason::RunOnBootOff)
        } else {
            None
        }
    }

    /// Runs the boot check and writes the compact summary to `out`.
    pub async fn run<W: Write + Send>(&self, out: &mut W) -> BootOutcome {
        if let Some(reason) = self.skip_reason() {
            debug!(?reason, "boot smoke tests skipped");
            return BootOutcome::Skipped(reason);
        }

        let mut config = self.config.clone();
        config.global_timeout = config.global_timeout.min(BOOT_TIMEOUT_CEILING);
        let ctx = self
            .ctx
            .clone()
            .unwrap_or_else(|| CheckContext::new(config.check_timeout, config.health_timeout));
        let report_log = ReportLog::new(config.report_log.clone());

        let servers = self.registry.active_servers();
        let orchestrator = Orchestrator::new(config, Arc::clone(&self.store), ctx);
        let report = orchestrator.run_all(&servers).await;

        let summary = render_boot_summary(&report);
        if !summary.is_empty()
            && let Err(err) = out.write_all(summary.as_bytes()).and_then(|()| out.flush())
        {
            warn!(error = %err, "failed to write boot smoke test summary");
        }

        if let Err(err) = report_log.append(RunTrigger::Boot, &report) {
            warn!(
                error = %err,
                path = %report_log.path().display(),
                "failed to record boot smoke test report"
            );
        }

        info!(
            passed = report.passed_tests,
            failed = report.failed_tests,
            critical = report.critical_failures.len(),
            timed_out = report.timed_out,
            "boot smoke tests finished"
        );
        BootOutcome::Completed(report)
    }

    /// Runs on a background task, writing to stderr.
    pub fn spawn(self) -> JoinHandle<BootOutcome> {
        tokio::spawn(async move {
            let mut stderr = std::io::stderr();
            self.run(&mut stderr).await
        })
    }
}
