//! Configuration loading, validation, and management for civicbot.
//!
//! Loads configuration from `~/.civicbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.civicbot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Character budgets for the assembled context
    #[serde(default)]
    pub context: ContextConfig,

    /// Chunking, retrieval, and vector-store persistence
    #[serde(default)]
    pub rag: RagConfig,

    /// Embedding service selection
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Per-section caps of the prompt assembler
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Persistent message log
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Headroom kept free for the system prompt and the reply.
    #[serde(default = "default_context_reserve")]
    pub context_reserve: usize,
}

fn default_max_context_chars() -> usize {
    32_000
}
fn default_context_reserve() -> usize {
    2_000
}

impl ContextConfig {
    /// Character budget of the trimmed conversation history.
    pub fn history_budget(&self) -> usize {
        self.max_context_chars.saturating_sub(self.context_reserve)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            context_reserve: default_context_reserve(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Ranked candidates examined per requested result when preferring
    /// distinct filenames.
    #[serde(default = "default_scan_multiplier")]
    pub scan_multiplier: usize,

    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    5
}
fn default_scan_multiplier() -> usize {
    3
}
fn default_store_dir() -> PathBuf {
    AppConfig::config_dir().join("vector_stores")
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            scan_multiplier: default_scan_multiplier(),
            store_dir: default_store_dir(),
        }
    }
}

/// Which embedding service backs the embedder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Ollama's native `/api/embeddings` endpoint
    #[default]
    Ollama,
    /// Any OpenAI-compatible `/embeddings` endpoint
    #[serde(rename = "openai")]
    OpenAi,
    /// Hash fallback only
    None,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "openai_compat" => Ok(Self::OpenAi),
            "none" | "" => Ok(Self::None),
            other => Err(ConfigError::ValidationError(format!(
                "unknown embedding provider '{other}' (expected ollama, openai or none)"
            ))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_embedding_host")]
    pub host: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Length of hash-derived fallback vectors.
    #[serde(default = "default_fallback_dimensions")]
    pub fallback_dimensions: usize,
}

fn default_embedding_host() -> String {
    "http://localhost:11434".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_fallback_dimensions() -> usize {
    128
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            host: default_embedding_host(),
            model: default_embedding_model(),
            api_key: None,
            timeout_secs: default_embedding_timeout(),
            fallback_dimensions: default_fallback_dimensions(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("fallback_dimensions", &self.fallback_dimensions)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Cap per ranked search result.
    #[serde(default = "default_result_chars")]
    pub result_chars: usize,

    /// Cap per raw document when no ranked results are available.
    #[serde(default = "default_document_chars")]
    pub document_chars: usize,

    #[serde(default = "default_documents_total_chars")]
    pub documents_total_chars: usize,

    /// A raw-document fragment shorter than this is not worth including.
    #[serde(default = "default_min_fragment_chars")]
    pub min_fragment_chars: usize,

    #[serde(default = "default_upload_chars")]
    pub upload_chars: usize,

    #[serde(default = "default_form_fields")]
    pub form_fields: usize,

    #[serde(default = "default_form_options")]
    pub form_options: usize,

    #[serde(default = "default_form_chars")]
    pub form_chars: usize,

    #[serde(default = "default_form_simple_chars")]
    pub form_simple_chars: usize,

    #[serde(default = "default_max_services")]
    pub max_services: usize,

    #[serde(default = "default_max_fees")]
    pub max_fees: usize,

    #[serde(default = "default_max_responsibilities")]
    pub max_responsibilities: usize,
}

fn default_result_chars() -> usize {
    2000
}
fn default_document_chars() -> usize {
    5000
}
fn default_documents_total_chars() -> usize {
    15_000
}
fn default_min_fragment_chars() -> usize {
    100
}
fn default_upload_chars() -> usize {
    2000
}
fn default_form_fields() -> usize {
    30
}
fn default_form_options() -> usize {
    2
}
fn default_form_chars() -> usize {
    1500
}
fn default_form_simple_chars() -> usize {
    1000
}
fn default_max_services() -> usize {
    20
}
fn default_max_fees() -> usize {
    15
}
fn default_max_responsibilities() -> usize {
    10
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            result_chars: default_result_chars(),
            document_chars: default_document_chars(),
            documents_total_chars: default_documents_total_chars(),
            min_fragment_chars: default_min_fragment_chars(),
            upload_chars: default_upload_chars(),
            form_fields: default_form_fields(),
            form_options: default_form_options(),
            form_chars: default_form_chars(),
            form_simple_chars: default_form_simple_chars(),
            max_services: default_max_services(),
            max_fees: default_max_fees(),
            max_responsibilities: default_max_responsibilities(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    format!(
        "sqlite://{}",
        AppConfig::config_dir().join("history.sqlite").display()
    )
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.civicbot/config.toml).
    ///
    /// Environment variables override the file:
    /// - `MAX_CONTEXT_CHARS`, `CONTEXT_RESERVE`
    /// - `OLLAMA_HOST`, `EMBEDDING_MODEL`
    /// - `CIVICBOT_EMBEDDING_PROVIDER`, `CIVICBOT_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAX_CONTEXT_CHARS") {
            self.context.max_context_chars = parse_number("MAX_CONTEXT_CHARS", &v)?;
        }
        if let Some(v) = lookup("CONTEXT_RESERVE") {
            self.context.context_reserve = parse_number("CONTEXT_RESERVE", &v)?;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.embedding.host = host;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(provider) = lookup("CIVICBOT_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = lookup("CIVICBOT_API_KEY");
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".civicbot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be > 0".into(),
            ));
        }

        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }

        if self.rag.top_k == 0 {
            return Err(ConfigError::ValidationError("rag.top_k must be > 0".into()));
        }

        if self.rag.scan_multiplier == 0 {
            return Err(ConfigError::ValidationError(
                "rag.scan_multiplier must be >= 1".into(),
            ));
        }

        if self.context.context_reserve >= self.context.max_context_chars {
            return Err(ConfigError::ValidationError(format!(
                "context.context_reserve ({}) must be smaller than context.max_context_chars ({})",
                self.context.context_reserve, self.context.max_context_chars
            )));
        }

        if self.embedding.fallback_dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.fallback_dimensions must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} must be a non-negative integer, got '{value}'"))
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.history_budget(), 30_000);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.prompt.documents_total_chars, 15_000);
        assert_eq!(parsed.rag.store_dir, config.rag.store_dir);
    }

    #[test]
    fn overlap_not_smaller_than_chunk_size_rejected() {
        let mut config = AppConfig::default();
        config.rag.chunk_overlap = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reserve_must_leave_room_for_history() {
        let mut config = AppConfig::default();
        config.context.context_reserve = 32_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("context_reserve"));
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut config = AppConfig::default();
        config.rag.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.context.max_context_chars, 32_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[rag]\nchunk_size = 500\nchunk_overlap = 50\n\n[embedding]\nprovider = \"none\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.embedding.provider, EmbeddingProvider::None);
        assert_eq!(config.prompt.upload_chars, 2000);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rag\nchunk_size = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MAX_CONTEXT_CHARS", "16000"),
            ("CONTEXT_RESERVE", "1000"),
            ("OLLAMA_HOST", "http://ollama:11434"),
            ("EMBEDDING_MODEL", "mxbai-embed-large"),
            ("CIVICBOT_EMBEDDING_PROVIDER", "openai"),
            ("CIVICBOT_API_KEY", "sk-test"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.context.history_budget(), 15_000);
        assert_eq!(config.embedding.host, "http://ollama:11434");
        assert_eq!(config.embedding.model, "mxbai-embed-large");
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn non_numeric_budget_override_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "MAX_CONTEXT_CHARS").then(|| "lots".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.embedding.api_key = Some("sk-secret-123".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("nomic-embed-text"));
        assert!(toml_str.contains("32000"));
        assert!(toml_str.contains("ollama"));
    }
}
