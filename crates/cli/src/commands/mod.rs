pub mod config_cmd;
pub mod history;
pub mod prompt;
pub mod store;

use civicbot_agent::AppContext;
use civicbot_config::AppConfig;
use civicbot_core::{ConversationKey, SessionId, TenantId, UserId};

/// How a conversation is addressed: by chat (tenant) alone, or by session.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConversationArgs {
    /// Session id; without it the tenant's chat conversation is used
    #[arg(long)]
    pub session: Option<String>,

    /// Only this user's messages
    #[arg(long)]
    pub user: Option<i64>,
}

impl ConversationArgs {
    pub fn key(&self, tenant: &str) -> ConversationKey {
        match &self.session {
            Some(session) => ConversationKey::session(tenant, SessionId::from(session.as_str())),
            None => ConversationKey::chat(tenant),
        }
    }

    pub fn user(&self) -> Option<UserId> {
        self.user.map(UserId)
    }
}

/// Load the config and open every store it names.
pub async fn open_app() -> Result<AppContext, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(AppContext::from_config(config).await?)
}

pub fn tenant_id(tenant: &str) -> TenantId {
    TenantId::from(tenant.trim())
}
