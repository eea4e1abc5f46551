//! Ollama native embeddings (`POST /api/embeddings`).

use async_trait::async_trait;
use civicbot_core::EmbeddingService;
use civicbot_core::error::EmbeddingError;
use civicbot_core::text::char_len;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Embeds text through a local or remote Ollama server.
pub struct OllamaEmbedder {
    host: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    /// `host` may omit the scheme (`localhost:11434`), as `OLLAMA_HOST` often does.
    pub fn new(
        host: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            host: normalize_host(&host.into()),
            model: model.into(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embeddings", self.host);
        debug!(model = %self.model, chars = char_len(text), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout(e.to_string())
                } else {
                    EmbeddingError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let body: OllamaEmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "model '{}' returned an empty embedding",
                self.model
            )));
        }
        if body.embedding.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "model '{}' returned a non-finite embedding component",
                self.model
            )));
        }

        Ok(body.embedding)
    }

    async fn health_check(&self) -> std::result::Result<bool, EmbeddingError> {
        let url = format!("{}/api/tags", self.host);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}
