//! Mock generation backend for testing
//!
//! Returns queued completions (or scripted failures) in FIFO order, with a
//! default canned completion once the queue is empty.

use crate::backend::GenerationBackend;
use crate::completion::{GenerationRequest, GenerationResponse};
use crate::error::{Error, Result};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A mock backend that replays queued completions.
pub struct MockBackend {
    name: String,
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend named "mock".
    #[must_use]
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a new mock backend with an explicit name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful completion.
    pub fn push_response(&self, content: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(content.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: Error) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Number of generate calls observed so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Copy of every request observed so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl GenerationBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let model = if request.model.is_empty() {
            "mock-model".to_string()
        } else {
            request.model.clone()
        };
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Ok(content)) => Ok(GenerationResponse { content, model }),
            Some(Err(err)) => Err(err),
            None => Ok(GenerationResponse {
                content: "mock response".to_string(),
                model,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn test_queue_order() {
        let backend = MockBackend::new();
        backend.push_response("first");
        backend.push_response("second");

        let req = GenerationRequest::new("m").with_message(Message::user("x"));
        assert_eq!(backend.generate(req.clone()).await.unwrap().content, "first");
        assert_eq!(
            backend.generate(req.clone()).await.unwrap().content,
            "second"
        );
        // Queue drained: default canned response.
        assert_eq!(
            backend.generate(req).await.unwrap().content,
            "mock response"
        );
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let backend = MockBackend::new();
        backend.push_error(Error::Api("boom".to_string()));

        let req = GenerationRequest::new("m");
        assert!(backend.generate(req).await.is_err());
    }
}
