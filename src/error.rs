//! Error types for docrag

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur in the retrieval pipeline
#[derive(Debug, Error)]
pub enum RagError {
    /// Feature or endpoint is not configured
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding endpoint unreachable or returned an error
    #[error("embedding service error: {0}")]
    Upstream(String),

    /// Document, user or task missing
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed search parameters, rejected before any external call
    #[error("validation error: {0}")]
    Validation(String),

    /// Embedding store failure
    #[error("store error: {0}")]
    Store(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lancedb error: {0}")]
    Lance(#[from] lancedb::Error),
}
