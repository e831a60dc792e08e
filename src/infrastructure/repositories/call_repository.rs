//! Call Repository Implementation
//!
//! PostgreSQL implementation of call persistence. Rows are written at
//! creation and on terminal transitions; signaling hops never hit this
//! table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Call, CallRepository, CallStatus, CallType};
use crate::shared::error::AppError;

pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for call queries.
#[derive(Debug, sqlx::FromRow)]
struct CallRow {
    id: Uuid,
    caller_id: Uuid,
    recipient_id: Uuid,
    call_type: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    duration_secs: Option<i64>,
    created_at: DateTime<Utc>,
}

impl CallRow {
    fn into_call(self) -> Call {
        Call {
            id: self.id,
            caller_id: self.caller_id,
            recipient_id: self.recipient_id,
            call_type: CallType::from_str(&self.call_type),
            status: CallStatus::from_str(&self.status),
            started_at: self.started_at,
            ended_at: self.ended_at,
            duration_secs: self.duration_secs,
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl CallRepository for PgCallRepository {
    async fn create(&self, call: &Call) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO calls
                (id, caller_id, recipient_id, call_type, status,
                 started_at, ended_at, duration_secs, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(call.id)
        .bind(call.caller_id)
        .bind(call.recipient_id)
        .bind(call.call_type.as_str())
        .bind(call.status.as_str())
        .bind(call.started_at)
        .bind(call.ended_at)
        .bind(call.duration_secs)
        .bind(call.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finalize(&self, call: &Call) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE calls
            SET status = $2, started_at = $3, ended_at = $4, duration_secs = $5
            WHERE id = $1
            "#,
        )
        .bind(call.id)
        .bind(call.status.as_str())
        .bind(call.started_at)
        .bind(call.ended_at)
        .bind(call.duration_secs)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, AppError> {
        let row = sqlx::query_as::<_, CallRow>(
            r#"
            SELECT id, caller_id, recipient_id, call_type, status,
                   started_at, ended_at, duration_secs, created_at
            FROM calls
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_call()))
    }
}
