//! Orchestration endpoint
//!
//! `POST /v1/orchestrate` takes one utterance plus caller-owned conversation
//! state and returns the final answer with per-step diagnostics. The service
//! holds no session; everything the engine needs rides in the request body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::{Extension, Router};
use kryptos_core::{Engine, Error, OrchestrateRequest};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Handle one orchestration request
async fn orchestrate(
    Extension(engine): Extension<Arc<Engine>>,
    Json(request): Json<OrchestrateRequest>,
) -> impl IntoResponse {
    match engine.handle(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            let status = status_for(&e);
            error!(error = %e, status = %status, "Orchestration failed");
            (status, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

// InvalidRequest is the caller's fault; everything else that escapes the
// engine means an upstream dependency let us down.
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::PlanDecodeFailed(_) | Error::AllStepsFailed { .. } | Error::Generation(_) => {
            StatusCode::BAD_GATEWAY
        }
        Error::ClassifierUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Create orchestration routes
pub fn orchestrate_routes() -> Router {
    Router::new().route("/v1/orchestrate", post(orchestrate))
}
