//! Mock capability invoker that returns pre-scripted responses.

use crate::suites::{CapabilityInvoker, InvokeError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock invoker for health checks.
///
/// Scripted entries are consumed in order; once exhausted every call gets
/// the last entry again. `Err` entries become tool errors.
#[derive(Debug, Clone)]
pub struct MockInvoker {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

#[derive(Debug)]
struct MockState {
    responses: Vec<Result<Value, String>>,
    current: usize,
    calls: Vec<InvocationRecord>,
}

/// Record of a mock invocation.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub endpoint: String,
    pub tool: String,
    pub payload: Value,
}

impl MockInvoker {
    pub fn new(responses: Vec<Result<Value, String>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responses,
                current: 0,
                calls: Vec::new(),
            })),
            delay: None,
        }
    }

    /// Sleeps this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn calls(&self) -> Vec<InvocationRecord> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl CapabilityInvoker for MockInvoker {
    async fn invoke(
        &self,
        endpoint: &str,
        tool: &str,
        payload: &Value,
        _timeout: Duration,
    ) -> Result<Value, InvokeError> {
        let scripted = {
            let mut state = self.lock();
            state.calls.push(InvocationRecord {
                endpoint: endpoint.to_string(),
                tool: tool.to_string(),
                payload: payload.clone(),
            });
            let index = state.current.min(state.responses.len().saturating_sub(1));
            state.current += 1;
            state.responses.get(index).cloned()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match scripted {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(InvokeError::Tool {
                tool: tool.to_string(),
                message,
            }),
            None => Err(InvokeError::Tool {
                tool: tool.to_string(),
                message: "no scripted response".to_string(),
            }),
        }
    }
}
