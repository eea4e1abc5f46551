//! Tenant documents and search results.

use serde::{Deserialize, Serialize};

/// Raw text of one tenant document, as handed over by the upload layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDocument {
    pub filename: String,
    pub content: String,
}

impl TenantDocument {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// One ranked chunk returned by a vector-store search. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub filename: String,
    pub text: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    pub chunk_index: usize,
    pub total_chunks: usize,
}
