//! Tenant, user, and conversation addressing.
//!
//! Every piece of store and history state is partitioned by [`TenantId`].
//! Conversations are addressed either directly by tenant (the legacy "chat"
//! mode, one running conversation per tenant) or by an explicit session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque tenant identifier. Integer ids from the relational layer are
/// carried in their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for TenantId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated end user, as known to the external auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Explicit chat session within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a conversation is addressed in the message log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConversationKey {
    /// Legacy mode: the tenant id is the conversation.
    Chat { tenant: TenantId },
    /// Explicit session inside a tenant.
    Session { tenant: TenantId, session: SessionId },
}

impl ConversationKey {
    pub fn chat(tenant: impl Into<TenantId>) -> Self {
        Self::Chat {
            tenant: tenant.into(),
        }
    }

    pub fn session(tenant: impl Into<TenantId>, session: SessionId) -> Self {
        Self::Session {
            tenant: tenant.into(),
            session,
        }
    }

    pub fn tenant(&self) -> &TenantId {
        match self {
            Self::Chat { tenant } | Self::Session { tenant, .. } => tenant,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::Chat { .. } => None,
            Self::Session { session, .. } => Some(session),
        }
    }

    /// Only legacy chat-addressed conversations are held in the process cache.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Chat { .. })
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat { tenant } => write!(f, "chat:{tenant}"),
            Self::Session { tenant, session } => write!(f, "session:{tenant}/{session}"),
        }
    }
}
