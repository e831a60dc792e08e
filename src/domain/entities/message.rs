//! Message entity and repository trait.
//!
//! Maps to the `messages` table; read receipts live in `message_reads`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Message content types matching the `message_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A plain text message
    #[default]
    Text,
    /// An image attachment reference
    Image,
    /// A video attachment reference
    Video,
    /// A generic file attachment reference
    File,
}

impl MessageType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "image" => Self::Image,
            "video" => Self::Video,
            "file" => Self::File,
            _ => Self::Text,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message inside a conversation.
///
/// The sender must be a conversation participant at send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// A read receipt. Only recorded for non-sender participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// Data access contract for messages.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a new message.
    async fn create(&self, message: &Message) -> Result<(), AppError>;

    /// Find a message by its ID. Returns None if absent.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError>;

    /// Append a read receipt for `user_id` to every message in the
    /// conversation lacking one, excluding the user's own messages.
    /// Returns the number of receipts added; calling again is a no-op.
    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, AppError>;

    /// Read receipts for a message.
    async fn read_receipts(&self, message_id: Uuid) -> Result<Vec<ReadReceipt>, AppError>;
}
