//! Server configuration types
//!
//! Everything here deserializes from layered TOML plus `KRYPTOS_`
//! environment variables; see `loader`.

use kryptos_core::{EngineConfig, SlotTemplate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Downstream agents, keyed by catalog name
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
    /// Fast-path intent routes
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl AppConfig {
    /// Engine knobs derived from the orchestrator section
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            intent_threshold: self.orchestrator.intent_threshold,
            entity_threshold: self.orchestrator.entity_threshold,
            request_timeout: Duration::from_secs(self.orchestrator.request_timeout_secs),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Intent/entity classifier service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// When false, every request degrades to signals only
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_classifier_url")]
    pub base_url: String,
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_classifier_url(),
            timeout_secs: default_classifier_timeout_secs(),
        }
    }
}

/// Orchestration engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Minimum classifier confidence for the fast path
    #[serde(default = "default_intent_threshold")]
    pub intent_threshold: f64,
    /// Minimum entity confidence for slot resolution
    #[serde(default = "default_entity_threshold")]
    pub entity_threshold: f64,
    /// Maximum plan steps in flight at once
    #[serde(default = "default_max_parallel_steps")]
    pub max_parallel_steps: usize,
    /// Overall budget for one request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            intent_threshold: default_intent_threshold(),
            entity_threshold: default_entity_threshold(),
            max_parallel_steps: default_max_parallel_steps(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Generation backends and role bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Per-call timeout for generation requests, in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_llm_timeout_secs(),
            roles: RolesConfig::default(),
            backends: BackendsConfig::default(),
        }
    }
}

/// Backend binding per logical generation role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub planner: RoleConfig,
    #[serde(default)]
    pub responder: RoleConfig,
}

/// One role's backend and model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default = "default_role_backend")]
    pub backend: String,
    /// Empty selects the backend's default model
    #[serde(default)]
    pub model: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            backend: default_role_backend(),
            model: String::new(),
        }
    }
}

/// All supported generation backends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default)]
    pub openai: BackendConfig,
    #[serde(default)]
    pub anthropic: BackendConfig,
    #[serde(default)]
    pub gemini: BackendConfig,
    #[serde(default)]
    pub ollama: BackendConfig,
}

/// One generation backend.
///
/// Empty strings fall back to the provider's own defaults and conventional
/// environment variables (`OPENAI_API_KEY` and friends).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
}

/// One downstream agent service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub base_url: String,
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One fast-path route: intent to a single agent operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub intent: String,
    pub agent: String,
    pub operation: String,
    /// Slot name to candidate names; empty candidates try the slot's own name
    #[serde(default)]
    pub slots: SlotTemplate,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8200
}
fn default_true() -> bool {
    true
}
fn default_classifier_url() -> String {
    "http://localhost:8100".to_string()
}
fn default_classifier_timeout_secs() -> u64 {
    10
}
fn default_intent_threshold() -> f64 {
    0.85
}
fn default_entity_threshold() -> f64 {
    0.6
}
fn default_max_parallel_steps() -> usize {
    4
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_llm_timeout_secs() -> u64 {
    20
}
fn default_role_backend() -> String {
    "ollama".to_string()
}
fn default_agent_timeout_secs() -> u64 {
    10
}
