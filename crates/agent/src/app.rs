//! Application-lifetime context: the shared stores and caches, and the
//! per-turn entry points request handlers call.

use crate::context::{
    AssembledPrompt, AssemblyInput, ConversationContextManager, PromptAssembler, Retrieval,
    retrieve,
};
use civicbot_config::AppConfig;
use civicbot_core::{
    BlobStore, ConversationKey, ConversationMessage, Error, InstitutionProfile, MessageLog,
    PageContext, Result, TenantDocument, UserId,
};
use civicbot_memory::{FileBlobStore, SqliteMessageLog, StoreSettings, VectorStoreRegistry};
use civicbot_providers::Embedder;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One inbound chat turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub key: ConversationKey,
    pub user: Option<UserId>,
    pub message: String,
    pub base_prompt: String,
    pub institution: Option<InstitutionProfile>,
    /// Raw documents for the no-ranked-results path. When `None`, the
    /// store's own documents are used.
    pub documents: Option<Vec<TenantDocument>>,
    /// Text extracted from a file attached to this turn.
    pub upload: Option<String>,
    pub page: Option<PageContext>,
}

impl TurnRequest {
    pub fn new(
        key: ConversationKey,
        message: impl Into<String>,
        base_prompt: impl Into<String>,
    ) -> Self {
        Self {
            key,
            user: None,
            message: message.into(),
            base_prompt: base_prompt.into(),
            institution: None,
            documents: None,
            upload: None,
            page: None,
        }
    }

    pub fn with_user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_institution(mut self, institution: InstitutionProfile) -> Self {
        self.institution = Some(institution);
        self
    }

    pub fn with_documents(mut self, documents: Vec<TenantDocument>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn with_upload(mut self, text: impl Into<String>) -> Self {
        self.upload = Some(text.into());
        self
    }

    pub fn with_page(mut self, page: PageContext) -> Self {
        self.page = Some(page);
        self
    }
}

/// Everything the inference call needs.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    /// The system message followed by the trimmed history, which ends with
    /// this turn's user message.
    pub messages: Vec<ConversationMessage>,
    pub prompt: AssembledPrompt,
}

pub struct AppContext {
    config: AppConfig,
    registry: Arc<VectorStoreRegistry>,
    conversations: ConversationContextManager,
    assembler: PromptAssembler,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        blobs: Arc<dyn BlobStore>,
        log: Arc<dyn MessageLog>,
        embedder: Arc<Embedder>,
    ) -> Result<Self> {
        let settings = StoreSettings::from_config(&config.rag)?;
        let registry = Arc::new(VectorStoreRegistry::new(blobs, embedder, settings));
        let conversations = ConversationContextManager::new(log, config.context.history_budget());
        let assembler = PromptAssembler::new(config.prompt.clone());

        Ok(Self {
            config,
            registry,
            conversations,
            assembler,
        })
    }

    /// Filesystem stores under `rag.store_dir`, the SQLite message log at
    /// `history.database_url`, and the configured embedding service.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        if let Some(parent) = sqlite_parent_dir(&config.history.database_url) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Internal(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        let log = SqliteMessageLog::new(&config.history.database_url).await?;
        let blobs = FileBlobStore::new(config.rag.store_dir.clone());
        let embedder = Embedder::from_config(&config.embedding);

        info!(
            store_dir = %config.rag.store_dir.display(),
            embedding = embedder.service_name().unwrap_or("fallback"),
            "Application context ready"
        );
        Self::new(config, Arc::new(blobs), Arc::new(log), Arc::new(embedder))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<VectorStoreRegistry> {
        &self.registry
    }

    pub fn conversations(&self) -> &ConversationContextManager {
        &self.conversations
    }

    pub fn assembler(&self) -> &PromptAssembler {
        &self.assembler
    }

    /// Record the user's message and build the messages for inference.
    ///
    /// Retrieval never fails the turn; message-log failures do.
    pub async fn prepare_turn(&self, request: TurnRequest) -> Result<PreparedTurn> {
        let TurnRequest {
            key,
            user,
            message,
            base_prompt,
            institution,
            documents,
            upload,
            page,
        } = request;

        let query = (!message.trim().is_empty()).then_some(message.as_str());
        if query.is_some() {
            self.conversations
                .append(&key, ConversationMessage::user(message.as_str()), user)
                .await?;
        }

        let retrieval: Retrieval = retrieve(
            &self.registry,
            key.tenant(),
            query,
            documents,
            self.config.rag.top_k,
        )
        .await;

        let history = self.conversations.get_trimmed_history(&key, user).await?;

        let form = page.and_then(PageContext::form_context);
        let prompt = self.assembler.assemble(&AssemblyInput {
            base_prompt: &base_prompt,
            institution: institution.as_ref(),
            retrieval: &retrieval,
            upload: upload.as_deref(),
            form: form.as_ref(),
        });

        info!(
            conversation = %key,
            history = history.len(),
            prompt_chars = prompt.report.total_chars,
            retrieval = ?prompt.report.retrieval,
            "Turn prepared"
        );

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ConversationMessage::system(prompt.text.as_str()));
        messages.extend(history);

        Ok(PreparedTurn { messages, prompt })
    }

    /// Append the model's reply. Blank replies are not recorded.
    pub async fn record_reply(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
        reply: &str,
    ) -> Result<bool> {
        if reply.trim().is_empty() {
            debug!(conversation = %key, "Blank reply not recorded");
            return Ok(false);
        }
        self.conversations
            .append(key, ConversationMessage::assistant(reply), user)
            .await?;
        Ok(true)
    }
}

/// Parent directory of a file-backed `sqlite://` URL.
fn sqlite_parent_dir(url: &str) -> Option<&Path> {
    if url.contains(":memory:") {
        return None;
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    Path::new(path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
}
