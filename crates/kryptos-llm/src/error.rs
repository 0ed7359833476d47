//! Error types for kryptos-llm

use thiserror::Error;

/// Generation backend error type
#[derive(Debug, Error)]
pub enum Error {
    /// Backend not configured (missing key, unknown name, unbound role)
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// API error (non-2xx response)
    #[error("api error: {0}")]
    Api(String),

    /// Response arrived but did not decode into the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
