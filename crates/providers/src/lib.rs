//! Embedding service implementations for civicbot.
//!
//! All services implement the `civicbot_core::EmbeddingService` trait.
//! The [`Embedder`] wraps the configured service and falls back to a
//! hash-derived vector whenever the service cannot answer.

pub mod fallback;
pub mod hash;
pub mod ollama;
pub mod openai_compat;

#[cfg(test)]
mod test_helpers;

pub use fallback::{Embedder, Embedding};
pub use hash::fallback_embedding;
pub use ollama::OllamaEmbedder;
pub use openai_compat::OpenAiCompatEmbedder;
