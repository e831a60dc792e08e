//! Notification Fan-out
//!
//! Converts domain events (like, comment, follow, mention, share, new
//! message) into persisted notification records and pushes them to the
//! recipient's live connections.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::application::events::ServerEvent;
use crate::application::registry::ConnectionRegistry;
use crate::domain::{Notification, NotificationRepository, NotificationType};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Optional references a notification may point at.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationContext {
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

/// Persists notifications and fans them out to live connections.
pub struct NotificationFanout {
    repository: Arc<dyn NotificationRepository>,
    registry: Arc<ConnectionRegistry>,
}

impl NotificationFanout {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Create and deliver a notification.
    ///
    /// Self-notifications are suppressed: the call logs and returns
    /// `Ok(None)` when recipient and actor coincide.
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        notification_type: NotificationType,
        actor_id: Uuid,
        context: NotificationContext,
        message: Option<String>,
    ) -> Result<Option<Notification>, AppError> {
        if recipient_id == actor_id {
            tracing::debug!(
                %recipient_id,
                r#type = %notification_type,
                "skipping self-notification"
            );
            return Ok(None);
        }

        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id,
            notification_type,
            actor_id,
            post_id: context.post_id,
            comment_id: context.comment_id,
            message: message.unwrap_or_else(|| default_message(notification_type)),
            link: default_link(notification_type, actor_id, context),
            is_read: false,
            created_at: Utc::now(),
        };

        self.repository.create(&notification).await?;
        metrics::record_notification(notification_type.as_str());

        let delivered = self.registry.emit_to_user(
            recipient_id,
            &ServerEvent::NewNotification {
                notification: notification.clone(),
            },
        );
        tracing::debug!(
            notification_id = %notification.id,
            %recipient_id,
            delivered,
            "notification created"
        );

        Ok(Some(notification))
    }

    /// Mark one notification as read; `NotFound` when absent or owned by
    /// another user.
    pub async fn mark_as_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Notification, AppError> {
        self.repository
            .mark_as_read(notification_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("notification {}", notification_id)))
    }

    /// Mark all of a user's notifications as read and tell every open
    /// device once. Idempotent on the store side; each call broadcasts
    /// exactly one `notifications_all_read`.
    pub async fn mark_all_as_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let updated = self.repository.mark_all_as_read(user_id).await?;
        self.registry
            .emit_to_user(user_id, &ServerEvent::NotificationsAllRead);
        Ok(updated)
    }

    /// Unread count for a user.
    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.repository.unread_count(user_id).await
    }

    /// Hard-delete a notification.
    pub async fn delete(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        self.repository.delete(notification_id, user_id).await
    }
}

fn default_message(notification_type: NotificationType) -> String {
    match notification_type {
        NotificationType::Follow => "You have a new follower".into(),
        NotificationType::Like => "Someone liked your post".into(),
        NotificationType::Comment => "Someone commented on your post".into(),
        NotificationType::Mention => "You were mentioned in a post".into(),
        NotificationType::Message => "You have a new message".into(),
        NotificationType::Share => "Someone shared your post".into(),
    }
}

fn default_link(
    notification_type: NotificationType,
    actor_id: Uuid,
    context: NotificationContext,
) -> String {
    match notification_type {
        NotificationType::Like | NotificationType::Comment | NotificationType::Share
        | NotificationType::Mention => context
            .post_id
            .map(|id| format!("/post/{}", id))
            .unwrap_or_default(),
        NotificationType::Follow => format!("/profile/{}", actor_id),
        NotificationType::Message => format!("/messages/{}", actor_id),
    }
}
