//! Execution planning
//!
//! Asks the planner-role backend for a JSON execution plan, scans the
//! completion for the first balanced JSON object, and validates every step
//! against the agent allow-list before anything runs. Planner traffic falls
//! through the role's backend candidates; decode or validation failure is a
//! hard error for the request.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::model::{Classification, Entity, ExecutionPlan};
use crate::signals::SignalMap;
use kryptos_llm::{ClientRegistry, GenerationRequest, GenerationRole, Message};
use std::sync::Arc;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You are an orchestration planner for a cryptography assistant. \
     Produce a compact JSON execution plan. Output only JSON with keys: \
     reasoning, needs_synthesis, steps. Each step has: agent, operation, \
     params, depends_on (optional array of step indexes).";

/// Per-request facts the planner tells the model about
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    /// Raw utterance
    pub text: &'a str,
    /// Prior conversation summary, empty when the caller carried none
    pub summary: &'a str,
    /// Classifier output, possibly degraded
    pub classification: &'a Classification,
    /// Strongest analyzer signal per kind
    pub signals: &'a SignalMap,
}

/// Builds validated execution plans through the planner role
pub struct Planner {
    registry: Arc<ClientRegistry>,
    catalog: Arc<Catalog>,
    agents: Vec<String>,
}

impl Planner {
    /// Create a planner over the given registry held to `agents` only.
    #[must_use]
    pub fn new(registry: Arc<ClientRegistry>, catalog: Arc<Catalog>, agents: Vec<String>) -> Self {
        Self {
            registry,
            catalog,
            agents,
        }
    }

    /// Ask for a plan and validate it.
    #[instrument(skip_all)]
    pub async fn build_plan(&self, input: &PlanInput<'_>) -> Result<ExecutionPlan> {
        let request = GenerationRequest::new("")
            .with_message(Message::system(SYSTEM_PROMPT))
            .with_message(Message::user(self.user_prompt(input)))
            .expect_json();

        let response = self
            .registry
            .generate_with_fallback(GenerationRole::Planner, request)
            .await?;

        debug!(model = %response.model, "planner completion received");

        let plan = decode_plan(&response.content)?;
        self.validate(plan)
    }

    fn user_prompt(&self, input: &PlanInput<'_>) -> String {
        format!(
            "User request: {}\n\
             Conversation summary: {}\n\
             Detected intent: {} (confidence: {:.2})\n\
             Entities: {}\n\
             Signals: {}\n\
             Available agents: {}\n\
             Allowed operations per agent: {}\n\
             If a single agent can answer, return one step. If clarification \
             is needed, return zero steps and set needs_synthesis=false with \
             reasoning asking for missing info.",
            input.text,
            non_empty(input.summary, "(none)"),
            non_empty(&input.classification.intent, "unknown"),
            input.classification.confidence,
            format_entities(&input.classification.entities),
            format_signals(input.signals),
            self.agents.join(", "),
            self.format_operations(),
        )
    }

    fn format_operations(&self) -> String {
        if self.agents.is_empty() {
            return "(none)".to_string();
        }
        self.agents
            .iter()
            .map(|agent| format!("{}: {}", agent, self.catalog.operations_for(agent).join(", ")))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    fn validate(&self, mut plan: ExecutionPlan) -> Result<ExecutionPlan> {
        for index in 0..plan.steps.len() {
            let step = &mut plan.steps[index];
            step.agent = step.agent.trim().to_lowercase();
            step.operation = self.catalog.normalize_operation(&step.agent, &step.operation);

            if !self.agents.iter().any(|a| a == &step.agent) {
                return Err(Error::PlanDecodeFailed(format!(
                    "step {index} references unknown agent {:?}",
                    step.agent
                )));
            }
            if !self.catalog.supports(&step.agent, &step.operation) {
                return Err(Error::PlanDecodeFailed(format!(
                    "operation {:?} not supported by {}",
                    step.operation, step.agent
                )));
            }
            for &dep in &step.depends_on {
                if dep >= index {
                    return Err(Error::PlanDecodeFailed(format!(
                        "step {index} depends on step {dep}, which is not an earlier step"
                    )));
                }
            }
        }
        Ok(plan)
    }
}

fn decode_plan(raw: &str) -> Result<ExecutionPlan> {
    let object = kryptos_llm::first_json_object(raw)
        .ok_or_else(|| Error::PlanDecodeFailed("no JSON object in planner output".to_string()))?;
    serde_json::from_str(object).map_err(|e| Error::PlanDecodeFailed(e.to_string()))
}

pub(crate) fn format_entities(entities: &[Entity]) -> String {
    if entities.is_empty() {
        return "(none)".to_string();
    }
    entities
        .iter()
        .map(|e| format!("{}={}({:.2})", e.kind, e.value, e.confidence))
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn format_signals(signals: &SignalMap) -> String {
    if signals.is_empty() {
        return "(none)".to_string();
    }
    signals
        .iter()
        .map(|(kind, value)| format!("{kind}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
