//! Server initialization and main run loop
//!
//! Assembles the orchestration engine from configuration and runs the HTTP
//! server until a shutdown signal arrives.

use super::config::{AppConfig, ClassifierConfig, LlmConfig};
use super::loader::load_config;
use anyhow::{bail, Context, Result};
use axum::{Extension, Router};
use kryptos_core::{
    AgentPool, Catalog, Classification, Classifier, Engine, Executor, HttpAgent, HttpClassifier,
    Planner, Responder, Route, RouteTable,
};
use kryptos_llm::{
    AnthropicBackend, AnthropicConfig, ClientRegistry, GeminiBackend, GeminiConfig, GenerationRole,
    OllamaBackend, OllamaConfig, OpenAiBackend, OpenAiConfig,
};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Run the server
pub async fn run(port_override: Option<u16>) -> Result<()> {
    let mut config = load_config().context("Failed to load configuration")?;
    if let Some(port) = port_override {
        config.server.port = port;
    }
    info!("Configuration loaded");

    let engine = Arc::new(build_engine(&config)?);
    info!(
        agents = config.agents.len(),
        routes = config.routes.len(),
        "Orchestration engine initialized"
    );

    let app = Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::orchestrate_routes())
        .layer(Extension(engine))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("kryptos shutdown complete");
    Ok(())
}

/// Assemble the engine from configuration.
pub fn build_engine(config: &AppConfig) -> Result<Engine> {
    let catalog = Arc::new(Catalog::default());

    let registry = build_registry(&config.llm)?;
    let pool = Arc::new(build_pool(config, &catalog)?);
    let routes = RouteTable::new(build_routes(config));
    let classifier = build_classifier(&config.classifier)?;

    let agents = pool.names().into_iter().map(String::from).collect();
    let planner = Planner::new(registry.clone(), catalog, agents);
    let responder = Responder::new(registry);
    let executor = Executor::new(pool, config.orchestrator.max_parallel_steps);

    Ok(Engine::new(
        classifier,
        routes,
        planner,
        responder,
        executor,
        config.engine_config(),
    ))
}

fn build_registry(llm: &LlmConfig) -> Result<Arc<ClientRegistry>> {
    let timeout = llm.request_timeout();
    let mut builder = ClientRegistry::builder();
    let mut enabled: Vec<&str> = Vec::new();

    if llm.backends.openai.enabled {
        let b = &llm.backends.openai;
        let mut cfg = OpenAiConfig::from_env().with_timeout(timeout);
        if !b.base_url.is_empty() {
            cfg = cfg.with_base_url(b.base_url.as_str());
        }
        if !b.api_key.is_empty() {
            cfg = cfg.with_api_key(b.api_key.as_str());
        }
        if !b.model.is_empty() {
            cfg = cfg.with_model(b.model.as_str());
        }
        let backend = OpenAiBackend::new(cfg).context("Failed to initialize OpenAI backend")?;
        builder = builder.register(Arc::new(backend));
        enabled.push("openai");
    }

    if llm.backends.anthropic.enabled {
        let b = &llm.backends.anthropic;
        let mut cfg = AnthropicConfig::from_env().with_timeout(timeout);
        if !b.base_url.is_empty() {
            cfg = cfg.with_base_url(b.base_url.as_str());
        }
        if !b.api_key.is_empty() {
            cfg = cfg.with_api_key(b.api_key.as_str());
        }
        if !b.model.is_empty() {
            cfg = cfg.with_model(b.model.as_str());
        }
        let backend =
            AnthropicBackend::new(cfg).context("Failed to initialize Anthropic backend")?;
        builder = builder.register(Arc::new(backend));
        enabled.push("anthropic");
    }

    if llm.backends.gemini.enabled {
        let b = &llm.backends.gemini;
        let mut cfg = GeminiConfig::from_env().with_timeout(timeout);
        if !b.base_url.is_empty() {
            cfg = cfg.with_base_url(b.base_url.as_str());
        }
        if !b.api_key.is_empty() {
            cfg = cfg.with_api_key(b.api_key.as_str());
        }
        if !b.model.is_empty() {
            cfg = cfg.with_model(b.model.as_str());
        }
        let backend = GeminiBackend::new(cfg).context("Failed to initialize Gemini backend")?;
        builder = builder.register(Arc::new(backend));
        enabled.push("gemini");
    }

    if llm.backends.ollama.enabled {
        let b = &llm.backends.ollama;
        let mut cfg = OllamaConfig::from_env().with_timeout(timeout);
        if !b.base_url.is_empty() {
            cfg = cfg.with_base_url(b.base_url.as_str());
        }
        if !b.model.is_empty() {
            cfg = cfg.with_model(b.model.as_str());
        }
        let backend = OllamaBackend::new(cfg).context("Failed to initialize Ollama backend")?;
        builder = builder.register(Arc::new(backend));
        enabled.push("ollama");
    }

    info!(backends = ?enabled, "Text generation backends registered");

    let registry = builder
        .bind(
            GenerationRole::Planner,
            llm.roles.planner.backend.as_str(),
            llm.roles.planner.model.as_str(),
        )
        .bind(
            GenerationRole::Responder,
            llm.roles.responder.backend.as_str(),
            llm.roles.responder.model.as_str(),
        )
        .build()
        .context("Failed to build the text generation registry")?;

    Ok(Arc::new(registry))
}

fn build_pool(config: &AppConfig, catalog: &Catalog) -> Result<AgentPool> {
    let mut pool = AgentPool::new();

    for (name, agent) in &config.agents {
        let operations = catalog.operations_for(name);
        if operations.is_empty() {
            warn!(agent = %name, "Agent is not in the operation catalog, skipping");
            continue;
        }

        let mut routes = BTreeMap::new();
        for operation in operations {
            if let Some(route) = catalog.route(name, operation) {
                routes.insert(operation.to_string(), route.clone());
            }
        }

        let client = HttpAgent::new(name, &agent.base_url, agent.timeout(), routes)
            .with_context(|| format!("Failed to initialize agent {name}"))?;
        pool.register(Arc::new(client));
        info!(agent = %name, base_url = %agent.base_url, "Agent registered");
    }

    if pool.names().is_empty() {
        bail!("No agents configured");
    }
    Ok(pool)
}

fn build_routes(config: &AppConfig) -> Vec<Route> {
    config
        .routes
        .iter()
        .map(|r| Route {
            intent: r.intent.clone(),
            agent: r.agent.clone(),
            operation: r.operation.clone(),
            slots: r.slots.clone(),
        })
        .collect()
}

fn build_classifier(config: &ClassifierConfig) -> Result<Arc<dyn Classifier>> {
    if !config.enabled {
        warn!("Classifier disabled, requests will rely on signal analysis only");
        return Ok(Arc::new(DisabledClassifier));
    }
    let classifier = HttpClassifier::new(&config.base_url, config.timeout())
        .context("Failed to initialize classifier client")?;
    info!(base_url = %config.base_url, "Classifier client initialized");
    Ok(Arc::new(classifier))
}

/// Stands in when no classifier service is configured. Every request then
/// runs on analyzer signals alone.
struct DisabledClassifier;

#[async_trait::async_trait]
impl Classifier for DisabledClassifier {
    async fn classify(&self, _text: &str) -> kryptos_core::Result<Classification> {
        Ok(Classification::unknown())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::loader::DEFAULT_CONFIG;
    use config::{Config, File, FileFormat};

    fn embedded_config() -> AppConfig {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_engine_builds_from_embedded_defaults() {
        let config = embedded_config();
        let engine = build_engine(&config);
        assert!(engine.is_ok(), "default config must boot: {:?}", engine.err());
    }

    #[test]
    fn test_engine_builds_with_classifier_disabled() {
        let mut config = embedded_config();
        config.classifier.enabled = false;
        assert!(build_engine(&config).is_ok());
    }

    #[test]
    fn test_unknown_agent_is_skipped_not_fatal() {
        let mut config = embedded_config();
        config.agents.insert(
            "weather_bot".to_string(),
            crate::server::config::AgentConfig {
                base_url: "http://localhost:9999".to_string(),
                timeout_secs: 5,
            },
        );
        assert!(build_engine(&config).is_ok());
    }

    #[test]
    fn test_no_agents_is_fatal() {
        let mut config = embedded_config();
        config.agents.clear();
        assert!(build_engine(&config).is_err());
    }

    #[test]
    fn test_unbound_role_backend_is_fatal() {
        let mut config = embedded_config();
        config.llm.roles.planner.backend = "openai".to_string();
        assert!(build_engine(&config).is_err());
    }
}
