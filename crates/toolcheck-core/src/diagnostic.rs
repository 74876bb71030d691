//! On-demand diagnostic operation.

use crate::orchestrator::Orchestrator;
use crate::policy::{OrchestratorConfig, TestLevel};
use crate::registry::ServerRegistry;
use crate::report::{SmokeTestReport, render_text};
use crate::report_log::{ReportLog, RunTrigger};
use crate::spec_store::SpecStore;
use crate::suites::CheckContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticRequest {
    /// Cumulative depth; `connectivity` also runs config checks.
    pub test_level: TestLevel,
    /// Servers to test. Empty means the registry's active servers.
    pub servers: Vec<String>,
    /// Added to the policy's exclusions.
    pub exclude: Vec<String>,
    /// Replaces the policy's global timeout.
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticResponse {
    pub structured: SmokeTestReport,
    pub text: String,
}

/// Runs smoke tests on request. Always returns a report.
pub struct Diagnostic {
    config: OrchestratorConfig,
    store: Arc<SpecStore>,
    registry: Arc<dyn ServerRegistry>,
    ctx: Option<CheckContext>,
    report_log: Option<ReportLog>,
}

impl Diagnostic {
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
            report_log: None,
        }
    }

    pub fn with_context(mut self, ctx: CheckContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    /// Also append each on-demand report to the policy's report log.
    pub fn with_report_log(mut self) -> Self {
        self.report_log = Some(ReportLog::new(self.config.report_log.clone()));
        self
    }

    pub fn store(&self) -> &SpecStore {
        &self.store
    }

    pub fn active_servers(&self) -> Vec<String> {
        self.registry.active_servers()
    }

    /// Policy for one request: levels from `test_level`, exclusions
    /// unioned, timeout replaced.
    pub fn effective_config(&self, request: &DiagnosticRequest) -> OrchestratorConfig {
        let mut config = self.config.clone();
        config.test_levels = request.test_level.levels();
        for server in &request.exclude {
            if !config.is_excluded(server) {
                config.exclude_servers.push(server.clone());
            }
        }
        if let Some(seconds) = request.timeout_seconds {
            config.global_timeout = Duration::from_secs(seconds.max(1));
        }
        config
    }

    pub async fn run(&self, request: &DiagnosticRequest) -> DiagnosticResponse {
        let config = self.effective_config(request);
        let servers = if request.servers.is_empty() {
            self.registry.active_servers()
        } else {
            request.servers.clone()
        };
        debug!(
            level = %request.test_level,
            servers = servers.len(),
            timeout_ms = config.global_timeout.as_millis(),
            "running on-demand smoke tests"
        );

        let ctx = self
            .ctx
            .clone()
            .unwrap_or_else(|| CheckContext::new(config.check_timeout, config.health_timeout));
        let orchestrator = Orchestrator::new(config, Arc::clone(&self.store), ctx);
        let report = orchestrator.run_all(&servers).await;

        if let Some(log) = &self.report_log
            && let Err(err) = log.append(RunTrigger::OnDemand, &report)
        {
            warn!(error = %err, "failed to record smoke test report");
        }

        DiagnosticResponse {
            text: render_text(&report),
            structured: report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use crate::spec::ServerSpec;
    use crate::types::TestType;
    use serde_json::json;
    use std::collections::HashMap;

    fn diagnostic(config: OrchestratorConfig) -> Diagnostic {
        let mut store = SpecStore::new();
        for server in ["fetch", "time"] {
            store.insert(
                server,
                ServerSpec::from_value(
                    json!({
                        "config": {"checks": [{"type": "env_var", "name": "HOME_DIR", "required": false}]},
                        "connectivity": {"checks": [{"type": "tcp", "endpoint": "127.0.0.1:1", "timeout_ms": 200}]}
                    }),
                    server,
                )
                .unwrap(),
            );
        }
        let ctx = CheckContext::default().with_env(Arc::new(HashMap::<String, String>::new()));
        Diagnostic::new(
            config,
            Arc::new(store),
            Arc::new(StaticRegistry::new(["fetch", "time"])),
        )
        .with_context(ctx)
    }

    #[test]
    fn request_defaults_to_connectivity() {
        let request: DiagnosticRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.test_level, TestLevel::Connectivity);
        assert!(request.servers.is_empty());
        assert!(request.timeout_seconds.is_none());
    }

    #[test]
    fn effective_config_applies_request() {
        let base = OrchestratorConfig {
            exclude_servers: vec!["docker".to_string()],
            ..OrchestratorConfig::default()
        };
        let request = DiagnosticRequest {
            test_level: TestLevel::Health,
            exclude: vec!["docker".to_string(), "time".to_string()],
            timeout_seconds: Some(30),
            ..DiagnosticRequest::default()
        };

        let config = diagnostic(base).effective_config(&request);

        assert!(config.test_levels.health);
        assert_eq!(config.exclude_servers, vec!["docker", "time"]);
        assert_eq!(config.global_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn config_level_runs_no_network_checks() {
        let request = DiagnosticRequest {
            test_level: TestLevel::Config,
            ..DiagnosticRequest::default()
        };

        let response = diagnostic(OrchestratorConfig::default()).run(&request).await;

        assert_eq!(response.structured.tested_servers, 2);
        assert!(
            response
                .structured
                .results
                .iter()
                .all(|result| result.test_type == TestType::Config)
        );
        assert!(response.text.starts_with("Smoke tests:"));
    }

    #[tokio::test]
    async fn explicit_servers_and_exclusions() {
        let request = DiagnosticRequest {
            test_level: TestLevel::Config,
            servers: vec!["time".to_string(), "fetch".to_string()],
            exclude: vec!["fetch".to_string()],
            ..DiagnosticRequest::default()
        };

        let report = diagnostic(OrchestratorConfig::default())
            .run(&request)
            .await
            .structured;

        assert_eq!(report.total_servers, 2);
        assert_eq!(report.tested_servers, 1);
        let fetch: Vec<_> = report.results_for("fetch").collect();
        assert_eq!(fetch.len(), 1);
        assert_eq!(fetch[0].status, crate::types::TestStatus::Skip);
    }

    #[tokio::test]
    async fn disabled_policy_still_returns_a_report() {
        let config = OrchestratorConfig {
            enabled: false,
            ..OrchestratorConfig::default()
        };
        let response = diagnostic(config).run(&DiagnosticRequest::default()).await;

        assert_eq!(response.structured.results.len(), 1);
        assert_eq!(response.structured.skipped_tests, 1);
    }

    #[tokio::test]
    async fn huge_timeout_still_returns_a_report() {
        let request = DiagnosticRequest {
            test_level: TestLevel::Config,
            timeout_seconds: Some(u64::MAX),
            ..DiagnosticRequest::default()
        };

        let report = diagnostic(OrchestratorConfig::default())
            .run(&request)
            .await
            .structured;

        assert!(!report.timed_out);
        assert_eq!(report.tested_servers, 2);
    }
}
