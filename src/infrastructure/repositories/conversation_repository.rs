//! Conversation Repository Implementation
//!
//! PostgreSQL implementation of conversation lookups. Participants are a
//! `uuid[]` column; per-participant deletion markers live in
//! `conversation_deletions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Conversation, ConversationRepository};
use crate::shared::error::AppError;

pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for conversation queries.
#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    participants: Vec<Uuid>,
    is_group: bool,
    group_name: Option<String>,
    last_message_id: Option<Uuid>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ConversationRow {
    fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            participants: self.participants,
            is_group: self.is_group,
            group_name: self.group_name,
            last_message_id: self.last_message_id,
            last_message_at: self.last_message_at,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, participants, is_group, group_name,
                   last_message_id, last_message_at, created_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_conversation()))
    }

    async fn find_by_participant(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT c.id, c.participants, c.is_group, c.group_name,
                   c.last_message_id, c.last_message_at, c.created_at
            FROM conversations c
            WHERE $1 = ANY(c.participants)
              AND NOT EXISTS (
                  SELECT 1 FROM conversation_deletions d
                  WHERE d.conversation_id = c.id AND d.user_id = $1
              )
            ORDER BY c.last_message_at DESC NULLS LAST
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_conversation()).collect())
    }

    async fn touch_last_message(
        &self,
        id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_id = $2, last_message_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
