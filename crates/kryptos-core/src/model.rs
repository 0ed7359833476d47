//! Request, classification, plan, and response types
//!
//! Everything here lives for exactly one request. The serialized field names
//! are the platform's wire contract and must not drift.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An incoming orchestration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrateRequest {
    /// Free-form user utterance
    pub text: String,
    /// Opaque caller-owned conversation state
    #[serde(default)]
    pub state: Map<String, Value>,
}

impl OrchestrateRequest {
    /// Create a request with empty state
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            state: Map::new(),
        }
    }

    /// Prior conversation summary, when the caller carried one in state
    #[must_use]
    pub fn state_summary(&self) -> Option<&str> {
        self.state.get("summary").and_then(Value::as_str)
    }
}

/// A classified entity extracted by the external classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type, e.g. "algorithm" or "password"
    #[serde(rename = "type")]
    pub kind: String,
    /// Extracted surface value
    pub value: String,
    /// Classifier confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
}

/// Output of the external intent/entity classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Intent label
    pub intent: String,
    /// Intent confidence in [0, 1]
    #[serde(default)]
    pub confidence: f64,
    /// Extracted entities
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Classification {
    /// Degraded classification used when the classifier is unreachable
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            intent: "unknown".to_string(),
            confidence: 0.0,
            entities: Vec::new(),
        }
    }
}

/// A structured execution plan produced by the Planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Why the plan looks the way it does; doubles as the clarification
    /// question for zero-step plans
    #[serde(default)]
    pub reasoning: String,
    /// Whether the Responder should merge step outputs into prose
    #[serde(default)]
    pub needs_synthesis: bool,
    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

/// One planned agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Target agent name
    pub agent: String,
    /// Operation on that agent
    pub operation: String,
    /// Named parameters (open map, resolved before execution)
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Indices of earlier steps this step needs completed first
    #[serde(default)]
    pub depends_on: Vec<usize>,
}

/// Which way the decision gate sent the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPath {
    /// Direct single-agent dispatch
    Fast,
    /// Planned multi-step dispatch
    Complex,
    /// Zero-step plan; the answer asks the user a question
    Clarification,
}

impl ExecutionPath {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Complex => "complex",
            Self::Clarification => "clarification",
        }
    }
}

/// Outcome of one step, successful or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Index of the step in the plan
    pub step_index: usize,
    /// Agent that ran (or was supposed to run)
    pub agent: String,
    /// Operation that ran
    pub operation: String,
    /// Agent output on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Failure description on error or skip
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl StepResult {
    /// True when the step produced an output
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

/// The orchestrator's reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrateResponse {
    /// Per-request identifier, also on the request's tracing span
    pub request_id: String,
    /// Final natural-language answer
    pub answer: String,
    /// Which path produced the answer
    pub execution_path: ExecutionPath,
    /// Per-step outcomes, in plan order
    pub step_results: Vec<StepResult>,
    /// Planner reasoning (or the router's note on the fast path)
    pub reasoning: String,
}

/// Generate a request identifier: `req-` plus twelve hex characters.
#[must_use]
pub fn new_request_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("req-{}", &hex[..12])
}

/// Render an agent output as an answer string.
///
/// Agents reply in JSON; a well-known text field is used verbatim when
/// present, anything else is compact-serialized.
#[must_use]
pub fn render_output(output: &Value) -> String {
    if let Value::String(s) = output {
        return s.clone();
    }
    if let Value::Object(map) = output {
        for key in ["answer", "message", "summary", "text"] {
            if let Some(Value::String(s)) = map.get(key) {
                return s.clone();
            }
        }
    }
    output.to_string()
}
