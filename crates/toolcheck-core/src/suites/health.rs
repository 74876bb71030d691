//! Functional checks: invoke a tool and validate the response.
//!
//! These consume real resources on the far side (API credits, rate limits),
//! so they are off unless the policy enables the health level.

use super::{SuiteOutcome, TestSuite};
use crate::spec::HealthCheck;
use crate::types::{CheckOutcome, CheckTimer, ResultSink, TestResult, TestType};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a capability invocation produced no usable response.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("tool '{tool}' reported an error: {message}")]
    Tool { tool: String, message: String },

    #[error("invocation timed out")]
    Timeout,
}

impl InvokeError {
    /// True when the server never answered, as opposed to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, InvokeError::Transport { .. } | InvokeError::Timeout)
    }
}

/// Invokes a named capability on a tool-server.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    async fn invoke(
        &self,
        endpoint: &str,
        tool: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, InvokeError>;
}

/// Sends a JSON-RPC 2.0 `tools/call` request over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
}

impl HttpInvoker {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CapabilityInvoker for HttpInvoker {
    async fn invoke(
        &self,
        endpoint: &str,
        tool: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, InvokeError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": tool, "arguments": payload},
        });

        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    InvokeError::Timeout
                } else {
                    InvokeError::Transport {
                        endpoint: endpoint.to_string(),
                        source,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvokeError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| InvokeError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            })?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_string);
            return Err(InvokeError::Tool {
                tool: tool.to_string(),
                message,
            });
        }

        let result = body
            .get("result")
            .cloned()
            .ok_or_else(|| InvokeError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: "missing 'result' member".to_string(),
            })?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(InvokeError::Tool {
                tool: tool.to_string(),
                message: result
                    .pointer("/content/0/text")
                    .and_then(Value::as_str)
                    .unwrap_or("tool returned isError")
                    .to_string(),
            });
        }

        Ok(result)
    }
}

pub struct HealthTestSuite {
    server: String,
    checks: Vec<HealthCheck>,
    enabled: bool,
    default_endpoint: Option<String>,
    invoker: Arc<dyn CapabilityInvoker>,
    default_timeout: Duration,
}

impl HealthTestSuite {
    pub fn new(
        server: impl Into<String>,
        checks: Vec<HealthCheck>,
        enabled: bool,
        default_endpoint: Option<String>,
        invoker: Arc<dyn CapabilityInvoker>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            server: server.into(),
            checks,
            enabled,
            default_endpoint,
            invoker,
            default_timeout,
        }
    }

    async fn evaluate(&self, check: &HealthCheck) -> CheckOutcome {
        let Some(endpoint) = check
            .endpoint
            .as_deref()
            .or(self.default_endpoint.as_deref())
        else {
            return CheckOutcome::skip(format!("no endpoint configured for tool {}", check.tool));
        };

        let timeout = check.timeout.unwrap_or(self.default_timeout);
        let invoked = tokio::time::timeout(
            timeout,
            self.invoker
                .invoke(endpoint, &check.tool, &check.payload, timeout),
        )
        .await;

        match invoked {
            Err(_) | Ok(Err(InvokeError::Timeout)) => {
                CheckOutcome::timeout(timeout, check.fix_suggestion.clone()).with_details(format!(
                    "deadline exceeded invoking {} at {endpoint}",
                    check.tool
                ))
            }
            Ok(Err(err)) => {
                let (default_message, label) = if err.is_unreachable() {
                    ("could not be invoked", "unreachable")
                } else {
                    ("returned an error", "reachable but errored")
                };
                let message = check
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("Tool {} {default_message}", check.tool));
                CheckOutcome::fail(message, check.fix_suggestion.clone())
                    .with_details(format!("{label}: {err}"))
            }
            Ok(Ok(response)) => match check.validator.validate(&response) {
                Ok(()) => CheckOutcome::pass(format!("Tool {} responded as expected", check.tool)),
                Err(reason) => {
                    let message = check.error_message.clone().unwrap_or_else(|| {
                        format!("Tool {} returned an unexpected response", check.tool)
                    });
                    CheckOutcome::fail(message, check.fix_suggestion.clone())
                        .with_details(format!("reachable but incorrect: {reason}"))
                }
            },
        }
    }
}

#[async_trait]
impl TestSuite for HealthTestSuite {
    fn name(&self) -> String {
        format!("{}_health", self.server)
    }

    fn test_type(&self) -> TestType {
        TestType::Health
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
            let mut evaluated = self.evaluate(check).await;
            if let Some(cost) = &check.cost_warning {
                let details = evaluated.details.take().unwrap_or_default();
                evaluated.details = Some(if details.is_empty() {
                    format!("cost: {cost}")
                } else {
                    format!("{details} [cost: {cost}]")
                });
            }

            let result = TestResult::from_outcome(
                &self.server,
                TestType::Health,
                check.tool.clone(),
                &timer,
                evaluated,
            );
            debug!(
                server = %self.server,
                tool = %check.tool,
                status = %result.status,
                "health check finished"
            );

            outcome.executed += 1;
            if sink.record(result).is_failure() {
                outcome.failed += 1;
            }
        }
        outcome
    }
}
