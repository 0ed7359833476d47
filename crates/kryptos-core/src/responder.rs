//! Response synthesis
//!
//! Merges step outputs into one user-facing answer through the responder
//! role. Exactly one attempt on the bound backend; a failure degrades to a
//! templated answer carrying the raw outputs instead of failing the request.

use crate::model::{Classification, StepResult};
use crate::planner::{format_entities, non_empty};
use kryptos_llm::{ClientRegistry, GenerationRequest, GenerationRole, Message};
use std::sync::Arc;
use tracing::{instrument, warn};

const SYSTEM_PROMPT: &str = "You are a cryptography assistant. Use the tool outputs to answer \
     the user. Be clear, concise, and conversational. If any tool output carries an error, \
     explain what failed and answer from the outputs that succeeded. If clarification is \
     required, ask one focused question.";

/// Per-request facts the responder synthesizes from
#[derive(Debug, Clone, Copy)]
pub struct ResponseInput<'a> {
    /// Raw utterance
    pub text: &'a str,
    /// Prior conversation summary, empty when the caller carried none
    pub summary: &'a str,
    /// Classifier output, possibly degraded
    pub classification: &'a Classification,
    /// Step results in plan order, failures included
    pub results: &'a [StepResult],
}

/// Synthesizes final answers through the responder role
pub struct Responder {
    registry: Arc<ClientRegistry>,
}

impl Responder {
    /// Create a responder over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Produce the final answer. Never fails; backend trouble degrades to a
    /// raw-output answer.
    #[instrument(skip_all)]
    pub async fn synthesize(&self, input: &ResponseInput<'_>) -> String {
        let request = GenerationRequest::new("")
            .with_message(Message::system(SYSTEM_PROMPT))
            .with_message(Message::user(user_prompt(input)));

        match self
            .registry
            .generate(GenerationRole::Responder, request)
            .await
        {
            Ok(response) => {
                let answer = response.content.trim().to_string();
                if answer.is_empty() {
                    warn!("responder returned an empty completion, using raw outputs");
                    fallback_answer(input.results)
                } else {
                    answer
                }
            }
            Err(err) => {
                warn!(error = %err, "synthesis failed, using raw outputs");
                fallback_answer(input.results)
            }
        }
    }
}

fn user_prompt(input: &ResponseInput<'_>) -> String {
    let outputs =
        serde_json::to_string(input.results).unwrap_or_else(|_| "[]".to_string());
    format!(
        "User request: {}\n\
         Conversation summary: {}\n\
         Detected intent: {} (confidence: {:.2})\n\
         Entities: {}\n\
         Tool outputs (JSON): {}\n",
        input.text,
        non_empty(input.summary, "(none)"),
        non_empty(&input.classification.intent, "unknown"),
        input.classification.confidence,
        format_entities(&input.classification.entities),
        outputs,
    )
}

fn fallback_answer(results: &[StepResult]) -> String {
    if results.is_empty() {
        return "I could not synthesize a final answer, and no step produced output.".to_string();
    }
    let mut answer = String::from("I could not synthesize a final answer. Raw step outputs:");
    for result in results {
        answer.push_str(&format!("\n- {}/{}: ", result.agent, result.operation));
        match &result.err {
            Some(err) => answer.push_str(&format!("error: {err}")),
            None => {
                let output = result
                    .output
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "null".to_string());
                answer.push_str(&output);
            }
        }
    }
    answer
}
