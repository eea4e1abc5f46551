//! Persistent message log trait.
//!
//! The log is the source of truth for conversation history; any in-process
//! cache sits in front of it. Failures are always surfaced to the caller.

use async_trait::async_trait;

use crate::error::HistoryError;
use crate::message::ConversationMessage;
use crate::tenant::{ConversationKey, UserId};

/// The core MessageLog trait.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait MessageLog: Send + Sync {
    /// The backend name (e.g., "sqlite", "memory").
    fn name(&self) -> &str;

    /// All messages of a conversation in order of occurrence. When `user`
    /// is given, only messages recorded for that user are returned.
    async fn read(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
    ) -> std::result::Result<Vec<ConversationMessage>, HistoryError>;

    /// Append one message.
    async fn write(
        &self,
        key: &ConversationKey,
        message: &ConversationMessage,
        user: Option<UserId>,
    ) -> std::result::Result<(), HistoryError>;

    /// Delete a conversation's messages (only `user`'s, when given).
    async fn clear(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
    ) -> std::result::Result<(), HistoryError>;
}
