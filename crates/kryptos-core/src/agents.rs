//! Downstream agent clients
//!
//! Every worker in the platform is called through the same thin interface:
//! `execute(operation, params)` against the agent's HTTP surface. Transport
//! failures are wrapped into a closed taxonomy here so nothing above this
//! layer ever sees a raw client error.

use crate::budget::Deadline;
use crate::catalog::OperationRoute;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Per-step agent failure, recorded on the step's result
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The call exceeded its time budget, or no budget remained to start it
    #[error("agent {agent} timed out after {timeout_ms}ms")]
    Timeout {
        /// Agent name
        agent: String,
        /// Budget the call was given, in milliseconds
        timeout_ms: u64,
    },

    /// The agent could not be reached at all
    #[error("agent {agent} unreachable: {reason}")]
    Unreachable {
        /// Agent name
        agent: String,
        /// Connection-level detail
        reason: String,
    },

    /// The agent answered but refused the call or broke its contract
    #[error("agent {agent} rejected {operation}: {reason}")]
    Rejected {
        /// Agent name
        agent: String,
        /// Operation that was attempted
        operation: String,
        /// What the agent said, or how the response was malformed
        reason: String,
    },
}

/// Uniform interface every downstream worker is called through
#[async_trait::async_trait]
pub trait AgentClient: Send + Sync {
    /// Agent name as known to the catalog
    fn name(&self) -> &str;

    /// Run one operation with fully resolved params inside the remaining
    /// request budget.
    async fn execute(
        &self,
        operation: &str,
        params: &Map<String, Value>,
        deadline: Deadline,
    ) -> Result<Value, AgentError>;
}

// ============================================================================
// HTTP Agent
// ============================================================================

#[derive(Debug, Deserialize)]
struct AgentErrorBody {
    error: String,
}

/// HTTP client for one configured agent
pub struct HttpAgent {
    name: String,
    base_url: String,
    timeout: Duration,
    routes: BTreeMap<String, OperationRoute>,
    client: reqwest::Client,
}

impl HttpAgent {
    /// Create a client for `name` rooted at `base_url`.
    ///
    /// `timeout` is the per-call ceiling; each call additionally clamps to
    /// the request's remaining budget. Fails only if the HTTP client itself
    /// cannot be built.
    pub fn new(
        name: &str,
        base_url: &str,
        timeout: Duration,
        routes: BTreeMap<String, OperationRoute>,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AgentError::Unreachable {
                agent: name.to_string(),
                reason: format!("http client init: {e}"),
            })?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            routes,
            client,
        })
    }

    fn timeout_error(&self, timeout: Duration) -> AgentError {
        AgentError::Timeout {
            agent: self.name.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

#[async_trait::async_trait]
impl AgentClient for HttpAgent {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, params, deadline), fields(agent = %self.name, operation = %operation))]
    async fn execute(
        &self,
        operation: &str,
        params: &Map<String, Value>,
        deadline: Deadline,
    ) -> Result<Value, AgentError> {
        let route = self
            .routes
            .get(operation)
            .ok_or_else(|| AgentError::Rejected {
                agent: self.name.clone(),
                operation: operation.to_string(),
                reason: "operation not supported".to_string(),
            })?;

        // A call that cannot fit the remaining budget is not started.
        let timeout = deadline
            .clamp(self.timeout)
            .ok_or_else(|| self.timeout_error(Duration::ZERO))?;

        let url = format!("{}{}", self.base_url, route.path);
        let body = if route.envelope {
            serde_json::json!({ "operation": operation, "params": params })
        } else {
            Value::Object(params.clone())
        };

        debug!("Calling agent at {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.timeout_error(timeout)
                } else if e.is_connect() {
                    AgentError::Unreachable {
                        agent: self.name.clone(),
                        reason: format!("failed to connect to {}", self.base_url),
                    }
                } else {
                    AgentError::Unreachable {
                        agent: self.name.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout_error(timeout)
            } else {
                AgentError::Unreachable {
                    agent: self.name.clone(),
                    reason: format!("read response: {e}"),
                }
            }
        })?;

        if !status.is_success() {
            let reason = serde_json::from_str::<AgentErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("status {status}"));
            return Err(AgentError::Rejected {
                agent: self.name.clone(),
                operation: operation.to_string(),
                reason,
            });
        }

        serde_json::from_str(&text).map_err(|_| AgentError::Rejected {
            agent: self.name.clone(),
            operation: operation.to_string(),
            reason: "invalid response payload".to_string(),
        })
    }
}

// ============================================================================
// Agent Pool
// ============================================================================

/// One client handle per configured agent, built once at start-up
#[derive(Default)]
pub struct AgentPool {
    agents: BTreeMap<String, Arc<dyn AgentClient>>,
}

impl AgentPool {
    /// Empty pool
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under its own name.
    pub fn register(&mut self, agent: Arc<dyn AgentClient>) {
        self.agents.insert(agent.name().to_lowercase(), agent);
    }

    /// Registered agent names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    /// True when `agent` has a registered client
    #[must_use]
    pub fn contains(&self, agent: &str) -> bool {
        self.agents.contains_key(&agent.to_lowercase())
    }

    /// Dispatch one operation to the named agent.
    pub async fn execute(
        &self,
        agent: &str,
        operation: &str,
        params: &Map<String, Value>,
        deadline: Deadline,
    ) -> Result<Value, AgentError> {
        let client = self
            .agents
            .get(&agent.to_lowercase())
            .ok_or_else(|| AgentError::Unreachable {
                agent: agent.to_string(),
                reason: "agent not configured".to_string(),
            })?;
        client.execute(operation, params, deadline).await
    }
}

// ============================================================================
// Mock Agent
// ============================================================================

/// A scriptable agent that replays queued outputs, for tests.
///
/// Records every call in start order and an event log with `start`/`end`
/// markers, so tests can assert both what was called and when relative to
/// other calls on the same agent.
pub struct MockAgent {
    name: String,
    delay: Option<Duration>,
    responses: Arc<Mutex<VecDeque<Result<Value, AgentError>>>>,
    calls: Arc<Mutex<Vec<(String, Map<String, Value>)>>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl MockAgent {
    /// Mock agent with the given catalog name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay: None,
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long inside every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful output.
    pub fn push_output(&self, output: Value) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(output));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: AgentError) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Number of calls observed so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every call observed so far, in start order
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `start <op>` / `end <op>` markers in the order they happened
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl AgentClient for MockAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        operation: &str,
        params: &Map<String, Value>,
        _deadline: Deadline,
    ) -> Result<Value, AgentError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((operation.to_string(), params.clone()));
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("start {operation}"));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("end {operation}"));

        match next {
            Some(result) => result,
            None => Ok(serde_json::json!({ "result": "ok" })),
        }
    }
}
