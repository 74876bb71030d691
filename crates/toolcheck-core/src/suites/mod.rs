//! Check evaluators, one suite per category.
//!
//! A suite is built per run from a server's spec document and owns its
//! checks. Running it evaluates every check in order and records each
//! result on the sink as soon as it is known, so a run cut short by the
//! global deadline still keeps everything that finished.

mod config;
mod connectivity;
mod health;

pub use config::{ConfigTestSuite, Environment, ProcessEnvironment};
pub use connectivity::{ConnectivityTestSuite, sanitize_endpoint};
pub use health::{CapabilityInvoker, HealthTestSuite, HttpInvoker, InvokeError};

use crate::types::{ResultSink, TestResult, TestType};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default deadline for one connectivity check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Default deadline for one health invocation.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// What a suite run produced, for fail-fast decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuiteOutcome {
    pub executed: usize,
    pub failed: usize,
}

impl SuiteOutcome {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// A named, enable-able collection of checks for one server.
#[async_trait]
pub trait TestSuite: Send + Sync {
    fn name(&self) -> String;

    fn test_type(&self) -> TestType;

    fn enabled(&self) -> bool;

    /// Number of checks a full run evaluates.
    fn check_count(&self) -> usize;

    /// Evaluates every check in order, recording each result on `sink`.
    async fn run(&self, sink: &ResultSink) -> SuiteOutcome;

    /// Runs the suite and returns its results in order.
    async fn collect(&self) -> Vec<TestResult> {
        let (sink, mut rx) = ResultSink::channel();
        self.run(&sink).await;
        drop(sink);

        let mut results = Vec::new();
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }
        results
    }
}

/// Shared collaborators handed to every suite of a run.
#[derive(Clone)]
pub struct CheckContext {
    pub env: Arc<dyn Environment>,
    pub invoker: Arc<dyn CapabilityInvoker>,
    pub http: reqwest::Client,
    pub check_timeout: Duration,
    pub health_timeout: Duration,
}

impl CheckContext {
    /// Process environment, plain HTTP client and the JSON-RPC invoker.
    pub fn new(check_timeout: Duration, health_timeout: Duration) -> Self {
        let http = reqwest::Client::new();
        Self {
            env: Arc::new(ProcessEnvironment),
            invoker: Arc::new(HttpInvoker::new(http.clone())),
            http,
            check_timeout,
            health_timeout,
        }
    }

    pub fn with_env(mut self, env: Arc<dyn Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_invoker(mut self, invoker: Arc<dyn CapabilityInvoker>) -> Self {
        self.invoker = invoker;
        self
    }
}

impl Default for CheckContext {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_TIMEOUT, DEFAULT_HEALTH_TIMEOUT)
    }
}

impl std::fmt::Debug for CheckContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckContext")
            .field("check_timeout", &self.check_timeout)
            .field("health_timeout", &self.health_timeout)
            .finish_non_exhaustive()
    }
}
