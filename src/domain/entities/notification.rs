//! Notification entity and repository trait.
//!
//! Maps to the `notifications` table. A notification is only ever created by
//! a domain action with a distinct actor and recipient.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Notification categories matching the `notification_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Follow,
    Like,
    Comment,
    Mention,
    Message,
    Share,
}

impl NotificationType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "follow" => Some(Self::Follow),
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            "mention" => Some(Self::Mention),
            "message" => Some(Self::Message),
            "share" => Some(Self::Share),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Mention => "mention",
            Self::Message => "message",
            Self::Share => "share",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted notification pushed to the recipient's live connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub notification_type: NotificationType,
    pub actor_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<Uuid>,
    pub message: String,
    /// Client navigation target when the notification is clicked
    pub link: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Data access contract for notifications.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Persist a new notification.
    async fn create(&self, notification: &Notification) -> Result<(), AppError>;

    /// Mark one notification as read, scoped to its recipient.
    /// Returns the updated record, or None when absent or owned by another
    /// user.
    async fn mark_as_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, AppError>;

    /// Mark every unread notification for the recipient as read.
    /// Returns the number of records updated; idempotent.
    async fn mark_all_as_read(&self, recipient_id: Uuid) -> Result<u64, AppError>;

    /// Unread notification count for a recipient.
    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, AppError>;

    /// Hard-delete a notification, scoped to its recipient.
    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> Result<(), AppError>;
}
