//! Message Repository Implementation
//!
//! PostgreSQL implementation of message persistence and read receipts.
//! Receipts live in `message_reads` keyed by (message_id, user_id).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Message, MessageRepository, MessageType, ReadReceipt};
use crate::shared::error::AppError;

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: String,
    media_url: Option<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            message_type: MessageType::from_str(&self.message_type),
            media_url: self.media_url,
            deleted: self.deleted,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReadReceiptRow {
    user_id: Uuid,
    read_at: DateTime<Utc>,
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: &Message) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO messages
                (id, conversation_id, sender_id, content, message_type,
                 media_url, deleted, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(&message.media_url)
        .bind(message.deleted)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, conversation_id, sender_id, content, message_type,
                   media_url, deleted, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, AppError> {
        // Receipts are only recorded for non-sender participants; the
        // NOT EXISTS guard makes repeated calls no-ops.
        let result = sqlx::query(
            r#"
            INSERT INTO message_reads (message_id, user_id, read_at)
            SELECT m.id, $2, NOW()
            FROM messages m
            WHERE m.conversation_id = $1
              AND m.sender_id <> $2
              AND m.deleted = FALSE
              AND NOT EXISTS (
                  SELECT 1 FROM message_reads r
                  WHERE r.message_id = m.id AND r.user_id = $2
              )
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn read_receipts(&self, message_id: Uuid) -> Result<Vec<ReadReceipt>, AppError> {
        let rows = sqlx::query_as::<_, ReadReceiptRow>(
            r#"
            SELECT user_id, read_at
            FROM message_reads
            WHERE message_id = $1
            ORDER BY read_at
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ReadReceipt {
                user_id: r.user_id,
                read_at: r.read_at,
            })
            .collect())
    }
}
