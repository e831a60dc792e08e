//! Notification Repository Implementation
//!
//! PostgreSQL implementation of notification persistence. Deletion is a
//! hard removal, not a soft flag.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Notification, NotificationRepository, NotificationType};
use crate::shared::error::AppError;

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for notification queries.
#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    notification_type: String,
    actor_id: Uuid,
    post_id: Option<Uuid>,
    comment_id: Option<Uuid>,
    message: String,
    link: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification, AppError> {
        let notification_type = NotificationType::from_str(&self.notification_type)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "unknown notification type in store: {}",
                    self.notification_type
                ))
            })?;

        Ok(Notification {
            id: self.id,
            recipient_id: self.recipient_id,
            notification_type,
            actor_id: self.actor_id,
            post_id: self.post_id,
            comment_id: self.comment_id,
            message: self.message,
            link: self.link,
            is_read: self.is_read,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, recipient_id, notification_type, actor_id, post_id,
                 comment_id, message, link, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.notification_type.as_str())
        .bind(notification.actor_id)
        .bind(notification.post_id)
        .bind(notification.comment_id)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_as_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, AppError> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING id, recipient_id, notification_type, actor_id, post_id,
                      comment_id, message, link, is_read, created_at
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_notification()).transpose()
    }

    async fn mark_all_as_read(&self, recipient_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE recipient_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE recipient_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE id = $1 AND recipient_id = $2
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
