//! Embedder: the configured embedding service with a hash fallback.
//!
//! `embed` never fails. When the service is missing, errors, exceeds its
//! timeout, or answers with a non-finite vector, the text is embedded with [`fallback_embedding`] and the returned
//! [`Embedding`] says so. Fallback vectors keep the pipeline available, but
//! search over them ranks by noise rather than meaning.

use civicbot_config::{EmbeddingConfig, EmbeddingProvider};
use civicbot_core::{EmbeddingOutcome, EmbeddingService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::hash::{DEFAULT_FALLBACK_DIMENSIONS, fallback_embedding};
use crate::ollama::OllamaEmbedder;
use crate::openai_compat::OpenAiCompatEmbedder;

/// A vector plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub outcome: EmbeddingOutcome,
}

pub struct Embedder {
    primary: Option<Arc<dyn EmbeddingService>>,
    timeout: Duration,
    fallback_dims: usize,
}

impl Embedder {
    /// Use `primary` first, giving each call at most `timeout`.
    pub fn new(primary: Arc<dyn EmbeddingService>, timeout: Duration) -> Self {
        Self {
            primary: Some(primary),
            timeout,
            fallback_dims: DEFAULT_FALLBACK_DIMENSIONS,
        }
    }

    /// Hash vectors only. Used when no service is configured and in tests.
    pub fn fallback_only() -> Self {
        Self {
            primary: None,
            timeout: Duration::from_secs(30),
            fallback_dims: DEFAULT_FALLBACK_DIMENSIONS,
        }
    }

    pub fn with_fallback_dimensions(mut self, dims: usize) -> Self {
        self.fallback_dims = dims.max(1);
        self
    }

    /// Build the embedder described by the `[embedding]` config section.
    ///
    /// A service whose client cannot be constructed is logged and replaced
    /// by the fallback; startup never fails because of it.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));

        let service: Option<Arc<dyn EmbeddingService>> = match config.provider {
            EmbeddingProvider::None => None,
            EmbeddingProvider::Ollama => {
                match OllamaEmbedder::new(&config.host, &config.model, timeout) {
                    Ok(s) => Some(Arc::new(s)),
                    Err(e) => {
                        warn!(error = %e, "Ollama embedder unavailable, using hash fallback");
                        None
                    }
                }
            }
            EmbeddingProvider::OpenAi => {
                let api_key = config.api_key.clone().unwrap_or_default();
                match OpenAiCompatEmbedder::new("openai", &config.host, api_key, &config.model, timeout) {
                    Ok(s) => Some(Arc::new(s)),
                    Err(e) => {
                        warn!(error = %e, "OpenAI-compatible embedder unavailable, using hash fallback");
                        None
                    }
                }
            }
        };

        let embedder = match service {
            Some(service) => Self::new(service, timeout),
            None => Self::fallback_only(),
        };
        embedder.with_fallback_dimensions(config.fallback_dimensions)
    }

    /// Name of the configured service, if any.
    pub fn service_name(&self) -> Option<&str> {
        self.primary.as_deref().map(|s| s.name())
    }

    pub fn fallback_dimensions(&self) -> usize {
        self.fallback_dims
    }

    pub async fn embed(&self, text: &str) -> Embedding {
        let Some(service) = &self.primary else {
            return self.fallback(text, "no embedding service configured".into());
        };

        match tokio::time::timeout(self.timeout, service.embed(text)).await {
            Ok(Ok(vector)) if vector.iter().any(|x| !x.is_finite()) => {
                warn!(
                    service = %service.name(),
                    model = %service.model(),
                    "Embedding service returned a non-finite vector, using hash fallback"
                );
                self.fallback(
                    text,
                    format!("embedding service '{}' returned a non-finite vector", service.name()),
                )
            }
            Ok(Ok(vector)) => {
                debug!(service = %service.name(), dims = vector.len(), "Embedded text");
                Embedding {
                    vector,
                    outcome: EmbeddingOutcome::Service {
                        name: service.name().to_string(),
                    },
                }
            }
            Ok(Err(e)) => {
                warn!(
                    service = %service.name(),
                    model = %service.model(),
                    error = %e,
                    "Embedding service failed, using hash fallback"
                );
                self.fallback(text, e.to_string())
            }
            Err(_) => {
                warn!(
                    service = %service.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Embedding service timed out, using hash fallback"
                );
                self.fallback(
                    text,
                    format!(
                        "embedding service '{}' timed out after {}s",
                        service.name(),
                        self.timeout.as_secs()
                    ),
                )
            }
        }
    }

    /// Whether the configured service answers. `false` when there is none.
    pub async fn health_check(&self) -> bool {
        match &self.primary {
            Some(service) => matches!(service.health_check().await, Ok(true)),
            None => false,
        }
    }

    fn fallback(&self, text: &str, reason: String) -> Embedding {
        Embedding {
            vector: fallback_embedding(text, self.fallback_dims),
            outcome: EmbeddingOutcome::Fallback { reason },
        }
    }
}
