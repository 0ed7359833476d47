//! Web API module for kryptos
//!
//! REST endpoints:
//! - `/health` — liveness probe for load balancers
//! - `/v1/orchestrate` — one-shot orchestration of a user utterance

pub mod health;
pub mod orchestrate;

pub use health::health_routes;
pub use orchestrate::orchestrate_routes;
