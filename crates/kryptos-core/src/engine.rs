//! End-to-end request handling
//!
//! The engine wires the classifier, the signal analyzer, the route table,
//! the planner, the executor, and the responder into one flow:
//!
//! ```text
//! request -> classify + analyze -> gate -> fast:   one direct agent call
//!                                       -> complex: plan -> resolve -> run -> synthesize
//!                                       -> clarification: zero-step plan, reasoning is the answer
//! ```
//!
//! The engine holds no cross-request state; registries and clients behind it
//! are process-wide and read-only.

use crate::budget::Deadline;
use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::model::{
    new_request_id, render_output, Classification, ExecutionPath, ExecutionPlan,
    OrchestrateRequest, OrchestrateResponse, PlanStep, StepResult,
};
use crate::planner::{PlanInput, Planner};
use crate::responder::{Responder, ResponseInput};
use crate::routes::{Route, RouteTable};
use crate::signals::{analyze, normalize_text};
use crate::slots::{resolve_params, resolve_template, ResolveContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Engine tuning knobs, all configuration-driven
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Minimum classifier confidence for the fast path
    pub intent_threshold: f64,
    /// Minimum entity confidence for slot resolution
    pub entity_threshold: f64,
    /// Overall budget for one request
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intent_threshold: 0.85,
            entity_threshold: 0.6,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Top-level request coordinator
pub struct Engine {
    classifier: Arc<dyn Classifier>,
    routes: RouteTable,
    planner: Planner,
    responder: Responder,
    executor: Executor,
    config: EngineConfig,
}

impl Engine {
    /// Assemble an engine from its already-constructed parts.
    #[must_use]
    pub fn new(
        classifier: Arc<dyn Classifier>,
        routes: RouteTable,
        planner: Planner,
        responder: Responder,
        executor: Executor,
        config: EngineConfig,
    ) -> Self {
        Self {
            classifier,
            routes,
            planner,
            responder,
            executor,
            config,
        }
    }

    /// Handle one orchestration request end to end.
    pub async fn handle(&self, request: OrchestrateRequest) -> Result<OrchestrateResponse> {
        let request_id = new_request_id();
        let span = info_span!("orchestrate", request_id = %request_id);
        self.handle_request(request_id, request).instrument(span).await
    }

    async fn handle_request(
        &self,
        request_id: String,
        request: OrchestrateRequest,
    ) -> Result<OrchestrateResponse> {
        if request.text.trim().is_empty() {
            return Err(Error::InvalidRequest("text is required".to_string()));
        }
        let deadline = Deadline::after(self.config.request_timeout);

        let signals = analyze(&normalize_text(&request.text)).to_map();
        // Classifier trouble degrades the request to signals only.
        let classification = match self.classifier.classify(&request.text).await {
            Ok(classification) => classification,
            Err(err) => {
                warn!(error = %err, "classifier unavailable, degrading to signals only");
                Classification::unknown()
            }
        };
        debug!(
            intent = %classification.intent,
            confidence = classification.confidence,
            entities = classification.entities.len(),
            signals = signals.len(),
            "request classified"
        );

        let ctx = ResolveContext {
            text: &request.text,
            entities: &classification.entities,
            signals: &signals,
            state: &request.state,
            entity_threshold: self.config.entity_threshold,
        };

        if let Some(route) = self.fast_route(&classification) {
            info!(intent = %route.intent, agent = %route.agent, "taking the fast path");
            return self.run_fast(request_id, route, &ctx, deadline).await;
        }

        let summary = request.state_summary().unwrap_or_default();
        let input = PlanInput {
            text: &request.text,
            summary,
            classification: &classification,
            signals: &signals,
        };
        let mut plan = self.planner.build_plan(&input).await?;

        // Zero steps means the planner wants more information from the user,
        // whatever the synthesis flag says.
        if plan.steps.is_empty() {
            info!("zero-step plan, asking for clarification");
            return Ok(OrchestrateResponse {
                request_id,
                answer: plan.reasoning.clone(),
                execution_path: ExecutionPath::Clarification,
                step_results: Vec::new(),
                reasoning: plan.reasoning,
            });
        }

        info!(steps = plan.steps.len(), "taking the complex path");
        for step in &mut plan.steps {
            step.params = resolve_params(&step.params, &ctx);
        }

        let results = self.executor.run(&plan, deadline).await?;

        let answer = if plan.needs_synthesis {
            let input = ResponseInput {
                text: &request.text,
                summary,
                classification: &classification,
                results: &results,
            };
            self.responder.synthesize(&input).await
        } else {
            render_final_output(&results)
        };

        Ok(OrchestrateResponse {
            request_id,
            answer,
            execution_path: ExecutionPath::Complex,
            step_results: results,
            reasoning: plan.reasoning,
        })
    }

    fn fast_route(&self, classification: &Classification) -> Option<&Route> {
        if classification.confidence < self.config.intent_threshold {
            return None;
        }
        self.routes.unique_match(&classification.intent)
    }

    // One direct call, no planner and no responder; the answer is whatever
    // the agent said.
    async fn run_fast(
        &self,
        request_id: String,
        route: &Route,
        ctx: &ResolveContext<'_>,
        deadline: Deadline,
    ) -> Result<OrchestrateResponse> {
        let reasoning = format!(
            "fast path: intent {:?} routed to {}/{}",
            route.intent, route.agent, route.operation
        );
        let plan = ExecutionPlan {
            reasoning: reasoning.clone(),
            needs_synthesis: false,
            steps: vec![PlanStep {
                agent: route.agent.clone(),
                operation: route.operation.clone(),
                params: resolve_template(&route.slots, ctx),
                depends_on: Vec::new(),
            }],
        };

        let results = self.executor.run(&plan, deadline).await?;
        Ok(OrchestrateResponse {
            request_id,
            answer: render_final_output(&results),
            execution_path: ExecutionPath::Fast,
            step_results: results,
            reasoning,
        })
    }
}

// The final successful step carries the answer when synthesis is off.
fn render_final_output(results: &[StepResult]) -> String {
    results
        .iter()
        .rev()
        .find_map(|result| result.output.as_ref())
        .map(render_output)
        .unwrap_or_default()
}
