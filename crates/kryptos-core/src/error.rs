//! Error types for kryptos-core

use thiserror::Error;

/// Request-level orchestration error
///
/// Per-step agent failures are not here: they ride on the step's result and
/// only escalate when the whole step set fails.
#[derive(Debug, Error)]
pub enum Error {
    /// The request itself is unusable (empty text)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Intent/entity service unreachable; callers degrade to signals only
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Planner output held no decodable plan, or the plan failed validation
    #[error("plan decode failed: {0}")]
    PlanDecodeFailed(String),

    /// Every step of the plan failed
    #[error("all steps failed: {reasoning}")]
    AllStepsFailed {
        /// The planner's reasoning, carried to the caller for context
        reasoning: String,
    },

    /// Generation layer failure (every planner candidate exhausted)
    #[error("generation failed: {0}")]
    Generation(#[from] kryptos_llm::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
