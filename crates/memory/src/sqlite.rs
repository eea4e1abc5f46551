//! SQLite message log.
//!
//! One `messages` table holds every tenant's history. Legacy chat-addressed
//! conversations have a NULL `session_id`; `IS` comparisons let one query
//! serve both addressing modes.

use async_trait::async_trait;
use chrono::Utc;
use civicbot_core::error::HistoryError;
use civicbot_core::{ConversationKey, ConversationMessage, MessageLog, Role, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteMessageLog {
    pool: SqlitePool,
}

impl SqliteMessageLog {
    /// Open (creating if missing) the database at `url`, e.g.
    /// `sqlite:///var/lib/civicbot/history.sqlite` or `sqlite::memory:`.
    pub async fn new(url: &str) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| HistoryError::Read(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to `:memory:` is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Read(format!("Failed to open SQLite: {e}")))?;

        let log = Self { pool };
        log.run_migrations().await?;
        info!("SQLite message log initialized at {url}");
        Ok(log)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, HistoryError> {
        let log = Self { pool };
        log.run_migrations().await?;
        Ok(log)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                tenant_id   TEXT NOT NULL,
                session_id  TEXT,
                user_id     INTEGER,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Write(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(tenant_id, session_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Write(format!("conversation index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn key_columns(key: &ConversationKey) -> (&str, Option<&str>) {
        (
            key.tenant().as_str(),
            key.session_id().map(|s| s.as_str()),
        )
    }
}

#[async_trait]
impl MessageLog for SqliteMessageLog {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn read(
        &self,
        key: &ConversationKey,
        user: Option<UserId>,
    ) -> Result<Vec<ConversationMessage>, HistoryError> {
        let (tenant, session) = Self::key_columns(key);

        let rows = sqlx::query(
            r#"
            SELECT role, content FROM messages
            WHERE tenant_id = ?1 AND session_id IS ?2 AND (?3 IS NULL OR user_id = ?3)
            ORDER BY id ASC
            "#,
        )
        .bind(tenant)
        .bind(session)
        .bind(user.map(|u| u.0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::Read(format!("{key}: {e}")))?;

        rows.iter()
            .map(|row| -> Result<ConversationMessage, HistoryError> {
                let role: String = row
                    .try_get("role")
                    .map_err(|e| HistoryError::Read(format!("role column: {e}")))?;
                let content: String = row
                    .try_get("content")
                    .map_err(|e| HistoryError::Read(format!("content column: {e}")))?;
                let role = Role::from_str(&role).map_err(HistoryError::Read)?;
                Ok(ConversationMessage { role, content })
            })
            .collect()
    }

    async fn write(
        &self,
        key: &ConversationKey,
        message: &ConversationMessage,
        user: Option<UserId>,
    ) -> Result<(), HistoryError> {
        let (tenant, session) = Self::key_columns(key);

        sqlx::query(
            r#"
            INSERT INTO messages (tenant_id, session_id, user_id, role, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(tenant)
        .bind(session)
        .bind(user.map(|u| u.0))
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Write(format!("{key}: {e}")))?;

        debug!(conversation = %key, role = %message.role, "Message stored");
        Ok(())
    }

    async fn clear(&self, key: &ConversationKey, user: Option<UserId>) -> Result<(), HistoryError> {
        let (tenant, session) = Self::key_columns(key);

        let result = sqlx::query(
            "DELETE FROM messages WHERE tenant_id = ?1 AND session_id IS ?2 AND (?3 IS NULL OR user_id = ?3)",
        )
        .bind(tenant)
        .bind(session)
        .bind(user.map(|u| u.0))
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Clear(format!("{key}: {e}")))?;

        debug!(conversation = %key, deleted = result.rows_affected(), "History cleared");
        Ok(())
    }
}
