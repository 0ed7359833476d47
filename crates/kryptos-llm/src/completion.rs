//! Generation request/response types
//!
//! One uniform request shape; each backend translates it to its own wire
//! format.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// A text-generation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model to use (backend-specific; empty selects the backend default)
    pub model: String,
    /// Role-tagged messages, system instruction included
    pub messages: Vec<Message>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Hint that the caller expects a structured (JSON) completion
    pub json_output: bool,
}

impl GenerationRequest {
    /// Create a new request for the given model
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message
    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request a structured (JSON) completion
    #[must_use]
    pub fn expect_json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// A text-generation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Completion text
    pub content: String,
    /// Model that produced the completion
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("gpt-5")
            .with_message(Message::system("plan things"))
            .with_message(Message::user("do it"))
            .with_temperature(0.0)
            .with_max_tokens(512)
            .expect_json();

        assert_eq!(request.model, "gpt-5");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(512));
        assert!(request.json_output);
    }
}
