//! In-memory message log (for testing).

use async_trait::async_trait;
use civicbot_core::error::HistoryError;
use civicbot_core::{ConversationKey, ConversationMessage, MessageLog, UserId};
use std::sync::{Mutex, PoisonError};

struct Record {
    key: ConversationKey,
    user: Option<UserId>,
    message: ConversationMessage,
}

impl Record {
    fn matches(&self, key: &ConversationKey, user: Option<UserId>) -> bool {
        self.key == *key && user.is_none_or(|u| self.user == Some(u))
    }
}

#[derive(Default)]
pub struct InMemoryMessageLog {
    records: Mutex<Vec<Record>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total messages across all conversations.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
    ) -> Result<Vec<ConversationMessage>, HistoryError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| r.matches(key, user))
            .map(|r| r.message.clone())
            .collect())
    }

    async fn write(
        &self,
        key: &ConversationKey,
        message: &ConversationMessage,
        user: Option<UserId>,
    ) -> Result<(), HistoryError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Record {
                key: key.clone(),
                user,
                message: message.clone(),
            });
        Ok(())
    }

    async fn clear(&self, key: &ConversationKey, user: Option<UserId>) -> Result<(), HistoryError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| !r.matches(key, user));
        Ok(())
    }
}
