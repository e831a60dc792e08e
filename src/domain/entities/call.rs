//! Call entity and repository trait.
//!
//! Maps to the `calls` table. Rows are written on creation and on terminal
//! transitions only; the signaling hops in between never touch the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Call media types matching the `call_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "audio" => Self::Audio,
            _ => Self::Video,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Call lifecycle status.
///
/// `initiated` and `ringing` are transient pre-connection states; the three
/// terminal states are mutually exclusive and final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    Ongoing,
    Completed,
    Missed,
    Rejected,
}

impl CallStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ringing" => Self::Ringing,
            "ongoing" => Self::Ongoing,
            "completed" => Self::Completed,
            "missed" => Self::Missed,
            "rejected" => Self::Rejected,
            _ => Self::Initiated,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Missed => "missed",
            Self::Rejected => "rejected",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Missed | Self::Rejected)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A one-to-one audio or video call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub caller_id: Uuid,
    pub recipient_id: Uuid,
    pub call_type: CallType,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Call {
    /// Both ends of the call.
    pub fn participants(&self) -> [Uuid; 2] {
        [self.caller_id, self.recipient_id]
    }

    /// Check whether a user is one of the two participants.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.caller_id == user_id || self.recipient_id == user_id
    }

    /// The other end of the call, relative to `user_id`.
    pub fn peer_of(&self, user_id: Uuid) -> Uuid {
        if self.caller_id == user_id {
            self.recipient_id
        } else {
            self.caller_id
        }
    }
}

/// Data access contract for calls.
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Persist a newly initiated call.
    async fn create(&self, call: &Call) -> Result<(), AppError>;

    /// Persist a terminal transition (status, timestamps, duration).
    async fn finalize(&self, call: &Call) -> Result<(), AppError>;

    /// Find a call by its ID. Returns None if absent.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, AppError>;
}
