//! Local configuration checks: environment variables and files.
//!
//! No network access and no suspension points; every check here is a
//! plain lookup against the environment or the filesystem.

use super::{SuiteOutcome, TestSuite};
use crate::spec::{ConfigCheck, ConfigCheckKind};
use crate::types::{CheckOutcome, CheckTimer, ResultSink, TestResult, TestType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::debug;

/// Source of environment variables.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

pub struct ConfigTestSuite {
    server: String,
    checks: Vec<ConfigCheck>,
    enabled: bool,
    env: Arc<dyn Environment>,
}

impl ConfigTestSuite {
    pub fn new(
        server: impl Into<String>,
        checks: Vec<ConfigCheck>,
        enabled: bool,
        env: Arc<dyn Environment>,
    ) -> Self {
        Self {
            server: server.into(),
            checks,
            enabled,
            env,
        }
    }

    fn evaluate(&self, check: &ConfigCheck) -> CheckOutcome {
        match check.kind {
            ConfigCheckKind::EnvVar => self.check_env_var(check),
            ConfigCheckKind::File => check_file(check),
            ConfigCheckKind::Permission => check_permission(check),
        }
    }

    fn check_env_var(&self, check: &ConfigCheck) -> CheckOutcome {
        let value = self
            .env
            .var(&check.name)
            .filter(|value| !value.is_empty());

        let Some(value) = value else {
            if check.required {
                let message = check.error_message.clone().unwrap_or_else(|| {
                    format!("Required environment variable {} is not set", check.name)
                });
                return CheckOutcome::fail(message, check.fix_suggestion.clone());
            }
            return CheckOutcome::skip("Optional variable not set");
        };

        if let Some(pattern) = &check.pattern
            && !pattern.is_match(&value)
        {
            let message = check.error_message.clone().unwrap_or_else(|| {
                format!("Environment variable {} has invalid format", check.name)
            });
            return CheckOutcome::fail(message, check.fix_suggestion.clone()).with_details(
                format!("Value does not match pattern: {}", pattern.as_str()),
            );
        }

        CheckOutcome::pass("Environment variable is set and valid")
    }
}

fn check_file(check: &ConfigCheck) -> CheckOutcome {
    let metadata = match fs::metadata(&check.name) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            if check.required {
                let message = check
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("Required file not found: {}", check.name));
                return CheckOutcome::fail(message, check.fix_suggestion.clone());
            }
            return CheckOutcome::skip("Optional file not present");
        }
        Err(err) => {
            return CheckOutcome::fail(
                format!("Error accessing file: {err}"),
                check.fix_suggestion.clone(),
            );
        }
    };

    if let Some(pattern) = &check.pattern {
        let content = match fs::read_to_string(&check.name) {
            Ok(content) => content,
            Err(err) => {
                return CheckOutcome::fail(
                    format!("Error reading file: {err}"),
                    check.fix_suggestion.clone(),
                );
            }
        };
        if !pattern.is_match(&content) {
            let message = check
                .error_message
                .clone()
                .unwrap_or_else(|| format!("File {} has invalid content", check.name));
            return CheckOutcome::fail(message, check.fix_suggestion.clone()).with_details(
                format!("Content does not match pattern: {}", pattern.as_str()),
            );
        }
    }

    CheckOutcome::pass(format!("File exists (size: {} bytes)", metadata.len()))
}

fn check_permission(check: &ConfigCheck) -> CheckOutcome {
    let metadata = match fs::metadata(&check.name) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return CheckOutcome::fail(
                format!("File not found: {}", check.name),
                check.fix_suggestion.clone(),
            );
        }
        Err(err) => {
            return CheckOutcome::fail(format!("Error accessing file: {err}"), None);
        }
    };

    if let Err(err) = fs::File::open(&check.name) {
        let fix = check
            .fix_suggestion
            .clone()
            .unwrap_or_else(|| format!("chmod +r {}", check.name));
        return CheckOutcome::fail(format!("File is not readable: {err}"), Some(fix));
    }

    CheckOutcome::pass(format!(
        "File has correct permissions (readonly: {})",
        metadata.permissions().readonly()
    ))
}

#[async_trait]
impl TestSuite for ConfigTestSuite {
    fn name(&self) -> String {
        format!("{}_config", self.server)
    }

    fn test_type(&self) -> TestType {
        TestType::Config
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
            let result = TestResult::from_outcome(
                &self.server,
                TestType::Config,
                check.name.clone(),
                &timer,
                self.evaluate(check),
            );
            debug!(
                server = %self.server,
                check = %check.name,
                kind = check.kind.as_str(),
                status = %result.status,
                "config check finished"
            );

            outcome.executed += 1;
            if sink.record(result).is_failure() {
                outcome.failed += 1;
            }
        }
        outcome
    }
}
