//! External intent/entity classifier client
//!
//! The classifier answers `POST /predict` for two operations, intent
//! extraction and entity extraction. Both are issued concurrently for every
//! request; a failure of either degrades the request to signals only and is
//! never fatal.

use crate::error::{Error, Result};
use crate::model::{Classification, Entity};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};

/// Interface to the intent/entity classifier
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one utterance.
    async fn classify(&self, text: &str) -> Result<Classification>;
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct PredictEnvelope<T> {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct IntentResult {
    #[serde(default)]
    label: String,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct EntityResult {
    #[serde(default)]
    entities: Vec<WireEntity>,
}

#[derive(Debug, Deserialize)]
struct WireEntity {
    #[serde(default)]
    entity: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    score: f64,
}

fn convert_entities(wire: Vec<WireEntity>) -> Vec<Entity> {
    wire.into_iter()
        .map(|e| Entity {
            kind: e.entity,
            value: e.text,
            confidence: e.score,
        })
        .collect()
}

// ============================================================================
// HTTP Classifier
// ============================================================================

/// HTTP client for the classifier service
pub struct HttpClassifier {
    base_url: String,
    client: reqwest::Client,
}

impl HttpClassifier {
    /// Create a client rooted at `base_url` with a per-call timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ClassifierUnavailable(format!("http client init: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn predict<T: DeserializeOwned>(&self, operation: &str, text: &str) -> Result<T> {
        let url = format!("{}/predict", self.base_url);
        let payload = json!({ "operation": operation, "input_text": text });

        debug!("Sending {} to classifier", operation);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::ClassifierUnavailable(format!(
                        "failed to connect to {}",
                        self.base_url
                    ))
                } else if e.is_timeout() {
                    Error::ClassifierUnavailable("request timed out".to_string())
                } else {
                    Error::ClassifierUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ClassifierUnavailable(format!("status {status}")));
        }

        let envelope: PredictEnvelope<T> = response
            .json()
            .await
            .map_err(|e| Error::ClassifierUnavailable(format!("decode response: {e}")))?;

        if envelope.status != "ok" {
            return Err(Error::ClassifierUnavailable(format!(
                "{} error: {}",
                operation, envelope.message
            )));
        }
        envelope
            .result
            .ok_or_else(|| Error::ClassifierUnavailable("empty result".to_string()))
    }

    async fn intent(&self, text: &str) -> Result<IntentResult> {
        self.predict("intent_extraction", text).await
    }

    async fn entities(&self, text: &str) -> Result<Vec<Entity>> {
        let result: EntityResult = self.predict("entity_extraction", text).await?;
        Ok(convert_entities(result.entities))
    }
}

#[async_trait::async_trait]
impl Classifier for HttpClassifier {
    #[instrument(skip(self, text))]
    async fn classify(&self, text: &str) -> Result<Classification> {
        let (intent, entities) = tokio::try_join!(self.intent(text), self.entities(text))?;
        Ok(Classification {
            intent: intent.label,
            confidence: intent.score,
            entities,
        })
    }
}

// ============================================================================
// Mock Classifier
// ============================================================================

/// A scriptable classifier that replays queued results, for tests.
pub struct MockClassifier {
    responses: Arc<Mutex<VecDeque<Result<Classification>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    /// Mock with an empty queue; drained calls answer "unknown".
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a classification.
    pub fn push_classification(&self, classification: Classification) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(classification));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: Error) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Texts observed so far, in call order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(result) => result,
            None => Ok(Classification::unknown()),
        }
    }
}
