//! Anthropic - Claude Messages API backend
//!
//! The Messages API takes the system instruction as a top-level field and
//! requires `max_tokens`, so both are split out of the uniform request here.

use crate::backend::GenerationBackend;
use crate::completion::{GenerationRequest, GenerationResponse};
use crate::error::{Error, Result};
use crate::message::{Message, MessageRole};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Anthropic model
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default Anthropic API URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// `max_tokens` is mandatory on this API; used when the request leaves it unset
const DEFAULT_MAX_TOKENS: u32 = 1024;

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// Backend Implementation
// ============================================================================

/// Anthropic backend configuration
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Base URL (default: <https://api.anthropic.com>)
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Default model
    pub default_model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AnthropicConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let default_model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            base_url,
            api_key,
            default_model,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Anthropic Claude backend
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a new backend; fails when no API key is configured
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::NotConfigured(
                "ANTHROPIC_API_KEY not set".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env())
    }

    /// Split the system instruction out of the message sequence.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<ApiMessage>) {
        let mut system_parts = Vec::new();
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => system_parts.push(msg.content.clone()),
                MessageRole::User | MessageRole::Assistant => converted.push(ApiMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, converted)
    }

    async fn send_request(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        let url = format!("{}/v1/messages", self.config.base_url);

        debug!("Sending request to Anthropic: {}", request.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout.as_millis() as u64)
                } else if e.is_connect() {
                    Error::Network(format!(
                        "failed to connect to Anthropic at {}",
                        self.config.base_url
                    ))
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                return Err(Error::Api(err.error.message));
            }
            return Err(Error::Api(format!("anthropic status {status}")));
        }

        serde_json::from_str(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        let (system, messages) = Self::convert_messages(&request.messages);

        let api_request = MessagesRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            temperature: request.temperature,
        };

        let response = self.send_request(api_request).await?;

        let content = response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| Error::InvalidResponse("no content blocks in response".to_string()))?;

        Ok(GenerationResponse {
            content,
            model: response.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AnthropicConfig::new()
            .with_base_url("http://localhost:8091")
            .with_api_key("ak-test")
            .with_model("claude-haiku-4-5")
            .with_timeout(Duration::from_secs(8));

        assert_eq!(config.base_url, "http://localhost:8091");
        assert_eq!(config.default_model, "claude-haiku-4-5");
        assert_eq!(config.timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_requires_api_key() {
        let result = AnthropicBackend::new(AnthropicConfig::new());
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[test]
    fn test_system_split_from_messages() {
        let messages = vec![
            Message::system("be terse"),
            Message::user("hello"),
            Message::assistant("hi"),
        ];
        let (system, converted) = AnthropicBackend::convert_messages(&messages);

        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
    }

    #[test]
    fn test_response_decode() {
        let body = r#"{
            "model": "claude-sonnet-4-5-20250929",
            "content": [{"type": "text", "text": "hello there"}]
        }"#;
        let decoded: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.content[0].text, "hello there");
    }
}
