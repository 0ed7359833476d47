//! Kryptos Core - Orchestration Engine
//!
//! This crate provides the orchestration logic for the kryptos cryptography
//! assistant, including:
//! - Signals: deterministic extraction of domain hints from raw text
//! - Slots: parameter resolution over entities, signals, and state
//! - Planning: asking a generation backend for a structured execution plan
//! - Execution: dependency-ordered agent dispatch with bounded parallelism
//! - Agents: uniform HTTP clients for the downstream worker services
//! - Engine: the end-to-end request handler composing all of the above

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod budget;
pub mod catalog;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod executor;
pub mod model;
pub mod planner;
pub mod responder;
pub mod routes;
pub mod signals;
pub mod slots;

pub use agents::{AgentClient, AgentError, AgentPool, HttpAgent, MockAgent};
pub use budget::Deadline;
pub use catalog::{Catalog, OperationRoute};
pub use classifier::{Classifier, HttpClassifier, MockClassifier};
pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use executor::Executor;
pub use model::{
    Classification, Entity, ExecutionPath, ExecutionPlan, OrchestrateRequest, OrchestrateResponse,
    PlanStep, StepResult,
};
pub use planner::{PlanInput, Planner};
pub use responder::{Responder, ResponseInput};
pub use routes::{Route, RouteTable};
pub use signals::{analyze, normalize_text, SignalMap, Signals};
pub use slots::{resolve_params, resolve_template, ResolveContext, SlotTemplate};
