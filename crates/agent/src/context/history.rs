//! Conversation history: trimming and the write-through cache.
//!
//! The message log is authoritative. The cache only holds chat-addressed
//! conversations (see [`ConversationKey::is_cacheable`]); session-addressed
//! ones are always read from the log.

use civicbot_core::error::HistoryError;
use civicbot_core::{ConversationKey, ConversationMessage, MessageLog, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// The most recent exchange is always kept, even over budget.
pub const MIN_KEPT_MESSAGES: usize = 2;

/// Drop the oldest messages until the history fits in `max_chars`.
///
/// Histories already within budget are returned unchanged. Otherwise the
/// newest messages are kept, walking backwards, and never fewer than
/// [`MIN_KEPT_MESSAGES`] even if those alone exceed the budget.
pub fn trim_history(
    mut history: Vec<ConversationMessage>,
    max_chars: usize,
) -> Vec<ConversationMessage> {
    let total: usize = history.iter().map(ConversationMessage::char_len).sum();
    if total <= max_chars {
        return history;
    }

    let mut kept = 0;
    let mut running = 0;
    for message in history.iter().rev() {
        let len = message.char_len();
        if running + len > max_chars && kept >= MIN_KEPT_MESSAGES {
            break;
        }
        kept += 1;
        running += len;
    }

    let mut start = history.len() - kept;
    while running > max_chars && history.len() - start > MIN_KEPT_MESSAGES {
        running -= history[start].char_len();
        start += 1;
    }

    debug!(
        before = history.len(),
        after = history.len() - start,
        chars = running,
        max_chars,
        "History trimmed"
    );
    history.drain(..start);
    history
}

type CacheKey = (ConversationKey, Option<UserId>);

#[derive(Default)]
struct HistoryCache {
    entries: HashMap<CacheKey, Vec<ConversationMessage>>,
    /// Bumped by every write, clear, or invalidation of a conversation. A
    /// log read only fills the cache if its conversation's generation did
    /// not move while the read was in flight.
    generations: HashMap<ConversationKey, u64>,
}

impl HistoryCache {
    fn generation(&self, key: &ConversationKey) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &ConversationKey) {
        *self.generations.entry(key.clone()).or_default() += 1;
    }
}

/// Per-conversation history over a [`MessageLog`].
pub struct ConversationContextManager {
    log: Arc<dyn MessageLog>,
    budget: usize,
    cache: Mutex<HistoryCache>,
}

impl ConversationContextManager {
    /// `budget` is the trim limit in characters
    /// (`max_context_chars - context_reserve`).
    pub fn new(log: Arc<dyn MessageLog>, budget: usize) -> Self {
        Self {
            log,
            budget,
            cache: Mutex::new(HistoryCache::default()),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn log_name(&self) -> &str {
        self.log.name()
    }

    /// The conversation's messages, oldest first.
    pub async fn get_history(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
    ) -> Result<Vec<ConversationMessage>, HistoryError> {
        let cache_key = (key.clone(), user);
        let mut generation = None;
        if key.is_cacheable() {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(messages) = cache.entries.get(&cache_key) {
                return Ok(messages.clone());
            }
            generation = Some(cache.generation(key));
        }

        let messages = self.log.read(key, user).await?;
        debug!(conversation = %key, messages = messages.len(), "History loaded from log");

        if let Some(generation) = generation {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if cache.generation(key) == generation {
                cache.entries.insert(cache_key, messages.clone());
            } else {
                debug!(conversation = %key, "History changed during read; not cached");
            }
        }
        Ok(messages)
    }

    /// The conversation's messages, trimmed to the budget.
    pub async fn get_trimmed_history(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
    ) -> Result<Vec<ConversationMessage>, HistoryError> {
        Ok(trim_history(self.get_history(key, user).await?, self.budget))
    }

    /// Write `message` to the log, then update cached views that would see it.
    ///
    /// A failed write leaves the cache untouched. Conversations not yet
    /// cached stay uncached until their next read, and a read already in
    /// flight will not cache its now stale snapshot.
    pub async fn append(
        &self,
        key: &ConversationKey,
        message: ConversationMessage,
        user: Option<UserId>,
    ) -> Result<(), HistoryError> {
        self.log.write(key, &message, user).await?;

        if !key.is_cacheable() {
            return Ok(());
        }

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.bump(key);
        for ((cached_key, cached_user), messages) in cache.entries.iter_mut() {
            // an unfiltered view sees every user's messages
            let visible = cached_user.is_none() || *cached_user == user;
            if cached_key == key && visible {
                messages.push(message.clone());
                *messages = trim_history(std::mem::take(messages), self.budget);
            }
        }
        Ok(())
    }

    /// Clear the conversation in the log and evict every affected cache entry.
    pub async fn clear(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
    ) -> Result<(), HistoryError> {
        self.log.clear(key, user).await?;

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.bump(key);
        cache.entries.retain(|(cached_key, cached_user), _| {
            let affected = cached_key == key
                && (user.is_none() || cached_user.is_none() || *cached_user == user);
            !affected
        });
        debug!(conversation = %key, "History cleared");
        Ok(())
    }

    /// Drop cached entries for `key` without touching the log.
    pub fn invalidate(&self, key: &ConversationKey) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.bump(key);
        cache.entries.retain(|(cached_key, _), _| cached_key != key);
    }

    /// Number of cached conversation views.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use civicbot_core::{Role, SessionId};
    use civicbot_memory::InMemoryMessageLog;

    fn msg(role: Role, len: usize) -> ConversationMessage {
        ConversationMessage::new(role, "x".repeat(len))
    }

    #[test]
    fn trim_keeps_last_two_over_budget() {
        let history: Vec<_> = (0..10)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ConversationMessage::new(role, format!("{i}").repeat(10_000))
            })
            .collect();
        let trimmed = trim_history(history, 5000);

        assert_eq!(trimmed.len(), 2);
        assert!(trimmed[0].content.starts_with('8'));
        assert!(trimmed[1].content.starts_with('9'));
        let total: usize = trimmed.iter().map(|m| m.char_len()).sum();
        assert_eq!(total, 20_000);
    }

    #[test]
    fn trim_under_budget_is_noop() {
        let history = vec![
            ConversationMessage::user("a".repeat(40)),
            ConversationMessage::assistant("b".repeat(40)),
            ConversationMessage::user("c".repeat(20)),
        ];
        assert_eq!(trim_history(history.clone(), 5000), history);
    }

    #[test]
    fn trim_empty_is_noop() {
        assert!(trim_history(Vec::new(), 0).is_empty());
    }

    #[test]
    fn trim_keeps_newest_that_fit() {
        let history = vec![
            msg(Role::User, 400),
            msg(Role::Assistant, 400),
            msg(Role::User, 300),
            msg(Role::Assistant, 300),
            msg(Role::User, 300),
        ];
        let trimmed = trim_history(history, 1000);
        assert_eq!(trimmed.len(), 3);
        assert_eq!(trimmed.iter().map(|m| m.char_len()).sum::<usize>(), 900);
    }

    #[test]
    fn trim_is_idempotent() {
        let history: Vec<_> = (0..6).map(|_| msg(Role::User, 300)).collect();
        let once = trim_history(history, 1000);
        let twice = trim_history(once.clone(), 1000);
        assert_eq!(once, twice);
    }

    #[test]
    fn trim_counts_chars_not_bytes() {
        let history = vec![
            ConversationMessage::user("ă".repeat(50)),
            ConversationMessage::assistant("ș".repeat(50)),
        ];
        // 100 chars, 200 bytes
        assert_eq!(trim_history(history, 100).len(), 2);
    }

    struct FailingLog;

    #[async_trait]
    impl MessageLog for FailingLog {
        fn name(&self) -> &str {
            "failing"
        }

        async fn read(
            &self,
            _: &ConversationKey,
            _: Option<UserId>,
        ) -> Result<Vec<ConversationMessage>, HistoryError> {
            Err(HistoryError::Read("database is locked".into()))
        }

        async fn write(
            &self,
            _: &ConversationKey,
            _: &ConversationMessage,
            _: Option<UserId>,
        ) -> Result<(), HistoryError> {
            Err(HistoryError::Write("database is locked".into()))
        }

        async fn clear(&self, _: &ConversationKey, _: Option<UserId>) -> Result<(), HistoryError> {
            Err(HistoryError::Clear("database is locked".into()))
        }
    }

    fn manager() -> (Arc<InMemoryMessageLog>, ConversationContextManager) {
        let log = Arc::new(InMemoryMessageLog::new());
        let manager = ConversationContextManager::new(log.clone(), 30_000);
        (log, manager)
    }

    #[tokio::test]
    async fn append_then_read() {
        let (log, manager) = manager();
        let key = ConversationKey::chat("12");

        manager.append(&key, ConversationMessage::user("Salut"), None).await.unwrap();
        manager.append(&key, ConversationMessage::assistant("Bună ziua!"), None).await.unwrap();

        let history = manager.get_history(&key, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "Bună ziua!");
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn cached_chat_sees_new_messages() {
        let (_log, manager) = manager();
        let key = ConversationKey::chat("12");

        manager.append(&key, ConversationMessage::user("one"), None).await.unwrap();
        assert_eq!(manager.get_history(&key, None).await.unwrap().len(), 1);
        assert_eq!(manager.cached_len(), 1);

        manager.append(&key, ConversationMessage::assistant("two"), None).await.unwrap();
        let history = manager.get_history(&key, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "two");
    }

    #[tokio::test]
    async fn uncached_append_does_not_create_partial_entry() {
        let (log, manager) = manager();
        let key = ConversationKey::chat("12");
        log.write(&key, &ConversationMessage::user("older"), None).await.unwrap();

        manager.append(&key, ConversationMessage::user("newer"), None).await.unwrap();
        assert_eq!(manager.cached_len(), 0);

        let history = manager.get_history(&key, None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "older");
    }

    #[tokio::test]
    async fn session_conversations_are_not_cached() {
        let (_log, manager) = manager();
        let key = ConversationKey::session("12", SessionId::from("s-1"));

        manager.append(&key, ConversationMessage::user("hi"), None).await.unwrap();
        assert_eq!(manager.get_history(&key, None).await.unwrap().len(), 1);
        assert_eq!(manager.cached_len(), 0);
    }

    #[tokio::test]
    async fn user_views_are_separate() {
        let (_log, manager) = manager();
        let key = ConversationKey::chat("12");
        let (ana, ion) = (Some(UserId(1)), Some(UserId(2)));

        assert!(manager.get_history(&key, None).await.unwrap().is_empty());
        assert!(manager.get_history(&key, ana).await.unwrap().is_empty());

        manager.append(&key, ConversationMessage::user("ana"), ana).await.unwrap();
        manager.append(&key, ConversationMessage::user("ion"), ion).await.unwrap();

        let for_ana = manager.get_history(&key, ana).await.unwrap();
        assert_eq!(for_ana, vec![ConversationMessage::user("ana")]);
        assert_eq!(manager.get_history(&key, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clear_empties_log_and_cache() {
        let (log, manager) = manager();
        let key = ConversationKey::chat("12");
        let other = ConversationKey::chat("13");

        manager.append(&key, ConversationMessage::user("a"), None).await.unwrap();
        manager.append(&other, ConversationMessage::user("b"), None).await.unwrap();
        manager.get_history(&key, None).await.unwrap();
        manager.get_history(&other, None).await.unwrap();

        manager.clear(&key, None).await.unwrap();

        assert!(manager.get_history(&key, None).await.unwrap().is_empty());
        assert_eq!(manager.get_history(&other, None).await.unwrap().len(), 1);
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn cache_is_trimmed_on_append() {
        let log = Arc::new(InMemoryMessageLog::new());
        let manager = ConversationContextManager::new(log.clone(), 100);
        let key = ConversationKey::chat("12");

        manager.get_history(&key, None).await.unwrap();
        for _ in 0..5 {
            manager.append(&key, msg(Role::User, 60), None).await.unwrap();
        }

        assert_eq!(manager.get_history(&key, None).await.unwrap().len(), 2);
        // the log keeps everything
        assert_eq!(log.len(), 5);
    }

    #[tokio::test]
    async fn write_failure_propagates_and_skips_cache() {
        let manager = ConversationContextManager::new(Arc::new(FailingLog), 1000);
        let key = ConversationKey::chat("12");

        let err = manager
            .append(&key, ConversationMessage::user("lost?"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HistoryError::Write(_)));
        assert_eq!(manager.cached_len(), 0);
    }

    /// Snapshots the log, then stalls before returning it.
    struct SlowReadLog {
        inner: InMemoryMessageLog,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl MessageLog for SlowReadLog {
        fn name(&self) -> &str {
            "slow-read"
        }

        async fn read(
            &self,
            key: &ConversationKey,
            user: Option<UserId>,
        ) -> Result<Vec<ConversationMessage>, HistoryError> {
            let snapshot = self.inner.read(key, user).await?;
            tokio::time::sleep(self.delay).await;
            Ok(snapshot)
        }

        async fn write(
            &self,
            key: &ConversationKey,
            message: &ConversationMessage,
            user: Option<UserId>,
        ) -> Result<(), HistoryError> {
            self.inner.write(key, message, user).await
        }

        async fn clear(&self, key: &ConversationKey, user: Option<UserId>) -> Result<(), HistoryError> {
            self.inner.clear(key, user).await
        }
    }

    #[tokio::test]
    async fn append_during_read_is_not_lost() {
        let log = Arc::new(SlowReadLog {
            inner: InMemoryMessageLog::new(),
            delay: std::time::Duration::from_millis(100),
        });
        let manager = Arc::new(ConversationContextManager::new(log, 30_000));
        let key = ConversationKey::chat("12");

        let reader = {
            let manager = manager.clone();
            let key = key.clone();
            tokio::spawn(async move { manager.get_history(&key, None).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        manager.append(&key, ConversationMessage::user("hello"), None).await.unwrap();

        // the stalled read returns its old snapshot but does not cache it
        assert!(reader.await.unwrap().unwrap().is_empty());
        assert_eq!(manager.cached_len(), 0);

        manager.append(&key, ConversationMessage::assistant("reply"), None).await.unwrap();
        let history = manager.get_history(&key, None).await.unwrap();
        assert_eq!(
            history,
            vec![ConversationMessage::user("hello"), ConversationMessage::assistant("reply")]
        );
        // and a settled read is cached again
        assert_eq!(manager.cached_len(), 1);
    }

    #[tokio::test]
    async fn read_and_clear_failures_propagate() {
        let manager = ConversationContextManager::new(Arc::new(FailingLog), 1000);
        let key = ConversationKey::chat("12");

        assert!(matches!(
            manager.get_history(&key, None).await,
            Err(HistoryError::Read(_))
        ));
        assert!(matches!(
            manager.clear(&key, None).await,
            Err(HistoryError::Clear(_))
        ));
    }
}
