//! Integration tests for kryptos
//!
//! These tests verify the integration between crates:
//! - kryptos-llm: backend registry, role bindings, fallback order
//! - kryptos-core: engine over classifier, planner, executor, and agents
//!
//! Every external dependency is a queue-backed mock, so each test drives the
//! full request path from utterance to answer without network access.

use kryptos_core::{
    AgentClient, AgentError, AgentPool, Catalog, Classification, Classifier, Engine, EngineConfig,
    Entity, Error, Executor, MockAgent, MockClassifier, OrchestrateRequest, Planner, Responder,
    Route, RouteTable, SlotTemplate,
};
use kryptos_llm::{ClientRegistry, GenerationRole, MockBackend};
use serde_json::json;
use std::sync::Arc;

// ============================================================================
// Test Harness
// ============================================================================

struct Harness {
    classifier: Arc<MockClassifier>,
    brain: Arc<MockBackend>,
    voice: Arc<MockBackend>,
    engine: Engine,
}

/// Full engine over mocks: `brain` plans, `voice` answers, both registered
/// so planner traffic can fall through from one to the other.
fn harness(agents: Vec<Arc<MockAgent>>, routes: Vec<Route>) -> Harness {
    let classifier = Arc::new(MockClassifier::new());
    let brain = Arc::new(MockBackend::named("brain"));
    let voice = Arc::new(MockBackend::named("voice"));

    let registry = Arc::new(
        ClientRegistry::builder()
            .register(brain.clone())
            .register(voice.clone())
            .bind(GenerationRole::Planner, "brain", "plan-model")
            .bind(GenerationRole::Responder, "voice", "answer-model")
            .build()
            .unwrap(),
    );

    let mut pool = AgentPool::new();
    for agent in agents {
        pool.register(agent);
    }
    let pool = Arc::new(pool);

    let catalog = Arc::new(Catalog::default());
    let names = pool.names().into_iter().map(String::from).collect();
    let planner = Planner::new(registry.clone(), catalog, names);
    let responder = Responder::new(registry);
    let executor = Executor::new(pool, 4);

    let engine = Engine::new(
        classifier.clone() as Arc<dyn Classifier>,
        RouteTable::new(routes),
        planner,
        responder,
        executor,
        EngineConfig::default(),
    );

    Harness {
        classifier,
        brain,
        voice,
        engine,
    }
}

fn intent(label: &str, confidence: f64) -> Classification {
    Classification {
        intent: label.to_string(),
        confidence,
        entities: vec![],
    }
}

fn encryption_route() -> Route {
    let mut slots = SlotTemplate::new();
    slots.insert("algorithm".to_string(), vec!["algorithm".to_string()]);
    slots.insert("text".to_string(), vec!["$text".to_string()]);
    Route {
        intent: "encryption".to_string(),
        agent: "crypto_executor".to_string(),
        operation: "aes_encrypt".to_string(),
        slots,
    }
}

// ============================================================================
// Fast Path
// ============================================================================

#[tokio::test]
async fn test_fast_path_feeds_analyzer_signals_into_slots() {
    let crypto = Arc::new(MockAgent::named("crypto_executor"));
    crypto.push_output(json!({ "ciphertext": "00ff" }));
    let h = harness(vec![crypto.clone()], vec![encryption_route()]);

    h.classifier.push_classification(intent("encryption", 0.93));

    let text = "encrypt with AES-256: attack at dawn";
    let response = h.engine.handle(OrchestrateRequest::new(text)).await.unwrap();

    assert_eq!(response.execution_path.as_str(), "fast");
    let calls = crypto.calls();
    assert_eq!(calls.len(), 1);
    let (operation, params) = &calls[0];
    assert_eq!(operation, "aes_encrypt");
    assert_eq!(params["algorithm"], json!("aes-256"));
    assert_eq!(params["text"], json!(text));

    // No object key the renderer recognizes, so the answer is the raw JSON.
    assert!(response.answer.contains("ciphertext"));
    assert_eq!(h.brain.request_count(), 0);
    assert_eq!(h.voice.request_count(), 0);
}

#[tokio::test]
async fn test_fast_path_prefers_classifier_entity_over_signal() {
    let crypto = Arc::new(MockAgent::named("crypto_executor"));
    crypto.push_output(json!({ "ciphertext": "beef" }));
    let h = harness(vec![crypto.clone()], vec![encryption_route()]);

    h.classifier.push_classification(Classification {
        intent: "encryption".to_string(),
        confidence: 0.9,
        entities: vec![Entity {
            kind: "algorithm".to_string(),
            value: "rsa".to_string(),
            confidence: 0.88,
        }],
    });

    h.engine
        .handle(OrchestrateRequest::new("encrypt this aes payload"))
        .await
        .unwrap();

    let (_, params) = &crypto.calls()[0];
    assert_eq!(params["algorithm"], json!("rsa"));
}

// ============================================================================
// Complex Path
// ============================================================================

#[tokio::test]
async fn test_complex_path_end_to_end_with_synthesis() {
    let crypto = Arc::new(MockAgent::named("crypto_executor"));
    crypto.push_output(json!({ "key": "k1" }));
    crypto.push_output(json!({ "ciphertext": "c1" }));
    let h = harness(vec![crypto.clone()], vec![]);

    h.classifier.push_classification(intent("encryption", 0.4));
    h.brain.push_response(
        json!({
            "reasoning": "generate a key, then encrypt",
            "needs_synthesis": true,
            "steps": [
                { "agent": "crypto_executor", "operation": "aes_keygen", "params": {} },
                {
                    "agent": "crypto_executor",
                    "operation": "aes_encrypt",
                    "params": { "text": "$text" },
                    "depends_on": [0]
                }
            ]
        })
        .to_string(),
    );
    h.voice.push_response("Generated a fresh key and encrypted your message.");

    let response = h
        .engine
        .handle(OrchestrateRequest::new("encrypt hello with a new key"))
        .await
        .unwrap();

    assert_eq!(response.execution_path.as_str(), "complex");
    assert_eq!(response.answer, "Generated a fresh key and encrypted your message.");
    assert_eq!(response.step_results.len(), 2);
    assert!(response.step_results.iter().all(|s| s.succeeded()));
    assert_eq!(response.reasoning, "generate a key, then encrypt");

    // Dependency order on a single agent: keygen ends before encrypt starts.
    assert_eq!(
        crypto.events(),
        vec![
            "start aes_keygen",
            "end aes_keygen",
            "start aes_encrypt",
            "end aes_encrypt"
        ]
    );
}

#[tokio::test]
async fn test_planner_falls_through_to_second_backend() {
    let prime = Arc::new(MockAgent::named("prime_checker"));
    prime.push_output(json!({ "answer": "7919 is prime" }));
    let h = harness(vec![prime], vec![]);

    h.classifier.push_classification(intent("unknown", 0.0));
    h.brain
        .push_error(kryptos_llm::Error::Api("planner backend down".to_string()));
    h.voice.push_response(
        json!({
            "reasoning": "single primality check",
            "needs_synthesis": false,
            "steps": [
                { "agent": "prime_checker", "operation": "isprime", "params": { "number": "7919" } }
            ]
        })
        .to_string(),
    );

    let response = h
        .engine
        .handle(OrchestrateRequest::new("is 7919 prime?"))
        .await
        .unwrap();

    assert_eq!(response.answer, "7919 is prime");
    assert_eq!(h.brain.request_count(), 1);
    assert_eq!(h.voice.request_count(), 1);
}

#[tokio::test]
async fn test_state_summary_reaches_planner_prompt() {
    let prime = Arc::new(MockAgent::named("prime_checker"));
    let h = harness(vec![prime], vec![]);

    h.classifier.push_classification(intent("unknown", 0.0));
    h.brain.push_response(
        json!({
            "reasoning": "one check",
            "needs_synthesis": false,
            "steps": [
                { "agent": "prime_checker", "operation": "isprime", "params": {} }
            ]
        })
        .to_string(),
    );

    let mut request = OrchestrateRequest::new("and that one?");
    request
        .state
        .insert("summary".to_string(), json!("user is testing Mersenne numbers"));
    h.engine.handle(request).await.unwrap();

    let requests = h.brain.requests();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0].messages.last().unwrap().content;
    assert!(prompt.contains("user is testing Mersenne numbers"), "{prompt}");
}

// ============================================================================
// Clarification and Error Surface
// ============================================================================

#[tokio::test]
async fn test_clarification_wire_shape() {
    let h = harness(vec![Arc::new(MockAgent::named("prime_checker"))], vec![]);

    h.classifier.push_classification(intent("unknown", 0.0));
    h.brain.push_response(
        json!({
            "reasoning": "Which algorithm should I use?",
            "needs_synthesis": false,
            "steps": []
        })
        .to_string(),
    );

    let response = h
        .engine
        .handle(OrchestrateRequest::new("encrypt it"))
        .await
        .unwrap();

    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["execution_path"], "clarification");
    assert_eq!(wire["answer"], "Which algorithm should I use?");
    assert_eq!(wire["step_results"], json!([]));
    assert!(wire["request_id"].as_str().unwrap().starts_with("req-"));
}

#[tokio::test]
async fn test_step_error_text_survives_to_wire() {
    let crypto = Arc::new(MockAgent::named("crypto_executor"));
    crypto.push_error(AgentError::Rejected {
        agent: "crypto_executor".to_string(),
        operation: "aes_decrypt".to_string(),
        reason: "bad key length".to_string(),
    });
    let checker = Arc::new(MockAgent::named("password_checker"));
    checker.push_output(json!({ "answer": "weak" }));
    let h = harness(vec![crypto, checker], vec![]);

    h.classifier.push_classification(intent("unknown", 0.3));
    h.brain.push_response(
        json!({
            "reasoning": "two independent checks",
            "needs_synthesis": false,
            "steps": [
                { "agent": "crypto_executor", "operation": "aes_decrypt", "params": {} },
                { "agent": "password_checker", "operation": "score", "params": {} }
            ]
        })
        .to_string(),
    );

    let response = h
        .engine
        .handle(OrchestrateRequest::new("decrypt and check"))
        .await
        .unwrap();

    let wire = serde_json::to_value(&response).unwrap();
    let steps = wire["step_results"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    let failed = &steps[0];
    assert_eq!(
        failed["error"],
        "agent crypto_executor rejected aes_decrypt: bad key length"
    );
    assert!(failed.get("output").is_none() || failed["output"].is_null());
    assert!(steps[1].get("error").is_none());
}

#[tokio::test]
async fn test_all_agents_down_is_hard_failure() {
    let crypto = Arc::new(MockAgent::named("crypto_executor"));
    crypto.push_error(AgentError::Unreachable {
        agent: "crypto_executor".to_string(),
        reason: "connection refused".to_string(),
    });
    let h = harness(vec![crypto], vec![]);

    h.classifier.push_classification(intent("unknown", 0.0));
    h.brain.push_response(
        json!({
            "reasoning": "hash the input",
            "needs_synthesis": false,
            "steps": [
                { "agent": "crypto_executor", "operation": "hash", "params": {} }
            ]
        })
        .to_string(),
    );

    let err = h
        .engine
        .handle(OrchestrateRequest::new("hash this"))
        .await
        .unwrap_err();
    match err {
        Error::AllStepsFailed { reasoning } => assert_eq!(reasoning, "hash the input"),
        other => panic!("expected AllStepsFailed, got {other}"),
    }
}

// ============================================================================
// Mock Agent Contract
// ============================================================================

#[tokio::test]
async fn test_pool_routes_across_registered_agents() {
    let prime = Arc::new(MockAgent::named("prime_checker"));
    let theory = Arc::new(MockAgent::named("theory_specialist"));
    prime.push_output(json!({ "prime": false }));
    theory.push_output(json!({ "answer": "because factors exist" }));

    let mut pool = AgentPool::new();
    pool.register(prime.clone());
    pool.register(theory.clone());

    let deadline = kryptos_core::Deadline::after(std::time::Duration::from_secs(5));
    let out = pool
        .execute("PRIME_CHECKER", "isprime", &serde_json::Map::new(), deadline)
        .await
        .unwrap();
    assert_eq!(out, json!({ "prime": false }));
    assert_eq!(prime.name(), "prime_checker");
    assert_eq!(theory.call_count(), 0);
}
