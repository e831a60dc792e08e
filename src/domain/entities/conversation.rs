//! Conversation entity and repository trait.
//!
//! Maps to the `conversations` table. Participants are stored as a
//! `uuid[]` column; per-participant deletion markers live in
//! `conversation_deletions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// A conversation between two or more users.
///
/// A direct conversation has exactly 2 participants and is unique per
/// unordered pair; group conversations may add/remove participants
/// explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: Vec<Uuid>,
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Check whether a user belongs to this conversation.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// Participants other than the given user.
    pub fn peers_of(&self, user_id: Uuid) -> Vec<Uuid> {
        self.participants
            .iter()
            .copied()
            .filter(|p| *p != user_id)
            .collect()
    }
}

/// Data access contract for conversations.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find a conversation by its ID. Returns None if absent.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError>;

    /// All conversations a user participates in (excluding ones the user
    /// deleted for themselves).
    async fn find_by_participant(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError>;

    /// Update the last-message pointer and timestamp.
    async fn touch_last_message(
        &self,
        id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}
