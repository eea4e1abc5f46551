//! Embedding service trait, the abstraction over text-to-vector backends.
//!
//! Implementations: Ollama native, OpenAI-compatible endpoints. Service
//! failures are absorbed by the embedder in `civicbot-providers`, which
//! reports what happened through [`EmbeddingOutcome`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

/// The core EmbeddingService trait.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// A human-readable name for this service (e.g., "ollama").
    fn name(&self) -> &str;

    /// The embedding model requested from the service.
    fn model(&self) -> &str;

    /// Embed a single text fragment.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError>;

    /// Health check: can we reach the service?
    async fn health_check(&self) -> std::result::Result<bool, EmbeddingError> {
        Ok(true)
    }
}

/// Where an embedding vector came from.
///
/// A `Fallback` vector is derived from a hash of the text and carries no
/// semantic meaning: search over fallback vectors degrades to near-random
/// ranking, but it never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingOutcome {
    Service { name: String },
    Fallback { reason: String },
}

impl EmbeddingOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}
