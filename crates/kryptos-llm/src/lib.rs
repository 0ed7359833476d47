//! Kryptos LLM - Text-Generation Backend Abstraction
//!
//! This crate provides the generation layer for the kryptos orchestrator:
//! - Backend: the `GenerationBackend` trait every provider implements
//! - OpenAI: OpenAI-compatible chat completions
//! - Anthropic: Claude Messages API
//! - Gemini: Google generateContent API
//! - Ollama: local Ollama chat API
//! - Registry: immutable name→backend table with per-role bindings
//! - Extract: balanced-JSON scanning for plan-shaped completions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod backend;
pub mod completion;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod message;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use backend::GenerationBackend;
pub use completion::{GenerationRequest, GenerationResponse};
pub use error::{Error, Result};
pub use extract::first_json_object;
pub use message::{Message, MessageRole};
pub use registry::{ClientRegistry, ClientRegistryBuilder, GenerationRole, RoleBinding};

// Re-export provider types
pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use gemini::{GeminiBackend, GeminiConfig};
pub use mock::MockBackend;
pub use ollama::{OllamaBackend, OllamaConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};
