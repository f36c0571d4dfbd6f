//! Message persistence
//!
//! `MessageStore` is the append-only port every chat message passes through
//! before it is routed. `SqliteStore` is the production backend; `MemoryStore`
//! keeps records in process for tests and throwaway runs.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::StoreError;
use crate::types::{ConversationId, ParticipantId};

/// One chat message as written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub conversation_id: ConversationId,
    pub sender_id: ParticipantId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only message store
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably record one message
    async fn append(&self, record: &MessageRecord) -> Result<(), StoreError>;
}

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` and create the `messages` table if needed
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        info!("Connecting to message database: {}", url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .connect(url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_query ON messages(query_id, id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, record: &MessageRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (query_id, sender_id, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(record.conversation_id.to_string())
        .bind(record.sender_id.to_string())
        .bind(&record.body)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<MessageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every appended record, oldest first
    pub fn records(&self) -> Vec<MessageRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
