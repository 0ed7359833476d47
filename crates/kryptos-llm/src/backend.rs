//! Generation backend trait definition
//!
//! This module defines the core trait that all generation backends must
//! implement.

use crate::completion::{GenerationRequest, GenerationResponse};
use crate::error::Result;

/// Trait for text-generation backends
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Produce one text completion for the request
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;
}
