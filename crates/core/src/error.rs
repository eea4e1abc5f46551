//! Error types for the civicbot domain.
//!
//! Each bounded context has its own `thiserror` enum. Degraded-but-usable
//! outcomes (fallback embeddings, unavailable retrieval) are not errors and
//! are modelled as outcome enums next to the values they describe.

use thiserror::Error;

/// The top-level error type for all civicbot operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the external embedding service. These never escape the
/// embedder; they become the reason attached to a fallback vector.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Embedding service not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Message-log failures. Always propagated to the caller.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to read history: {0}")]
    Read(String),

    #[error("Failed to write message: {0}")]
    Write(String),

    #[error("Failed to clear history: {0}")]
    Clear(String),
}
