//! Chat message persistence
//!
//! The relay only needs two operations: append a message and read back the
//! most recent window in chronological order.

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::types::{ChatMessage, NewChatMessage};

/// Append-only store of chat messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Validate and persist a message, returning it with its generated id
    async fn insert(&self, message: NewChatMessage) -> StoreResult<ChatMessage>;

    /// The `limit` most recent messages, oldest first
    async fn recent(&self, limit: usize) -> StoreResult<Vec<ChatMessage>>;

    /// Total number of stored messages
    async fn count(&self) -> StoreResult<u64>;
}

// =============================================================================
// Postgres
// =============================================================================

/// Message store backed by the `chat_messages` table
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: NewChatMessage) -> StoreResult<ChatMessage> {
        message.validate().map_err(StoreError::Validation)?;

        let row: ChatMessage = sqlx::query_as(
            r#"
            INSERT INTO chat_messages (id, sender, text, is_admin, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender, text, is_admin, timestamp, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&message.sender)
        .bind(&message.text)
        .bind(message.is_admin)
        .bind(&message.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        // Newest window first, then flipped back to insertion order
        let rows: Vec<ChatMessage> = sqlx::query_as(
            r#"
            SELECT id, sender, text, is_admin, timestamp, created_at
            FROM (
                SELECT id, sender, text, is_admin, timestamp, created_at, seq
                FROM chat_messages
                ORDER BY created_at DESC, seq DESC
                LIMIT $1
            ) recent
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local message store used by tests
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: RwLock<Vec<ChatMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: NewChatMessage) -> StoreResult<ChatMessage> {
        message.validate().map_err(StoreError::Validation)?;

        let stored = ChatMessage {
            id: Uuid::new_v4(),
            sender: message.sender,
            text: message.text,
            is_admin: message.is_admin,
            timestamp: message.timestamp,
            created_at: OffsetDateTime::now_utc(),
        };

        self.messages.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<ChatMessage>> {
        let messages = self.messages.read().await;
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.messages.read().await.len() as u64)
    }
}
