//! Typed gateway event vocabulary.
//!
//! Inbound and outbound events are closed enums with strongly-typed
//! payloads; the gateway dispatches through an explicit match instead of
//! string-keyed handlers. The wire envelope is
//! `{"event": <name>, "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Call, CallType, Conversation, Message, MessageType, Notification};

/// Payload for `join_conversation` / `leave_conversation` /
/// `typing_start` / `typing_stop` / `mark_conversation_read`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRef {
    pub conversation_id: Uuid,
}

/// Payload for `send_message`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessagePayload {
    pub conversation_id: Uuid,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[validate(url(message = "media_url must be a valid URL"))]
    pub media_url: Option<String>,
}

/// Payload for `call_initiate`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallInitiatePayload {
    pub recipient_id: Uuid,
    #[serde(rename = "type")]
    pub call_type: CallType,
}

/// Payload for `call_accept` / `call_reject` / `call_end`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallRef {
    pub call_id: Uuid,
}

/// Payload for the `webrtc_*` relay events. The negotiation blob is opaque
/// to the server.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalPayload {
    pub call_id: Uuid,
    pub target_user_id: Uuid,
    pub payload: Value,
}

/// Payload for `mark_notification_read`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRef {
    pub notification_id: Uuid,
}

/// Payload for `post_liked`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostLikedPayload {
    pub post_author_id: Uuid,
    pub post_id: Uuid,
}

/// Payload for `post_commented`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostCommentedPayload {
    pub post_author_id: Uuid,
    pub post_id: Uuid,
    pub comment_id: Option<Uuid>,
}

/// Every inbound event the gateway understands.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    JoinConversation(ConversationRef),
    LeaveConversation(ConversationRef),
    SendMessage(SendMessagePayload),
    TypingStart(ConversationRef),
    TypingStop(ConversationRef),
    MarkConversationRead(ConversationRef),
    CallInitiate(CallInitiatePayload),
    CallAccept(CallRef),
    CallReject(CallRef),
    CallEnd(CallRef),
    WebrtcOffer(SignalPayload),
    WebrtcAnswer(SignalPayload),
    WebrtcIceCandidate(SignalPayload),
    MarkNotificationRead(NotificationRef),
    MarkAllNotificationsRead,
    PostLiked(PostLikedPayload),
    PostCommented(PostCommentedPayload),
}

impl ClientEvent {
    /// Map an envelope to a typed event.
    ///
    /// `Ok(None)` means the event name is unknown and must be dropped
    /// silently (forward compatibility). A `serde_json::Error` means the
    /// name was recognized but the payload did not fit.
    pub fn parse(name: &str, data: Value) -> Result<Option<Self>, serde_json::Error> {
        use serde_json::from_value;

        let event = match name {
            "join_conversation" => Self::JoinConversation(from_value(data)?),
            "leave_conversation" => Self::LeaveConversation(from_value(data)?),
            "send_message" => Self::SendMessage(from_value(data)?),
            "typing_start" => Self::TypingStart(from_value(data)?),
            "typing_stop" => Self::TypingStop(from_value(data)?),
            "mark_conversation_read" => Self::MarkConversationRead(from_value(data)?),
            "call_initiate" => Self::CallInitiate(from_value(data)?),
            "call_accept" => Self::CallAccept(from_value(data)?),
            "call_reject" => Self::CallReject(from_value(data)?),
            "call_end" => Self::CallEnd(from_value(data)?),
            "webrtc_offer" => Self::WebrtcOffer(from_value(data)?),
            "webrtc_answer" => Self::WebrtcAnswer(from_value(data)?),
            "webrtc_ice_candidate" => Self::WebrtcIceCandidate(from_value(data)?),
            "mark_notification_read" => Self::MarkNotificationRead(from_value(data)?),
            "mark_all_notifications_read" => Self::MarkAllNotificationsRead,
            "post_liked" => Self::PostLiked(from_value(data)?),
            "post_commented" => Self::PostCommented(from_value(data)?),
            _ => return Ok(None),
        };

        Ok(Some(event))
    }

    /// Event name for logging and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinConversation(_) => "join_conversation",
            Self::LeaveConversation(_) => "leave_conversation",
            Self::SendMessage(_) => "send_message",
            Self::TypingStart(_) => "typing_start",
            Self::TypingStop(_) => "typing_stop",
            Self::MarkConversationRead(_) => "mark_conversation_read",
            Self::CallInitiate(_) => "call_initiate",
            Self::CallAccept(_) => "call_accept",
            Self::CallReject(_) => "call_reject",
            Self::CallEnd(_) => "call_end",
            Self::WebrtcOffer(_) => "webrtc_offer",
            Self::WebrtcAnswer(_) => "webrtc_answer",
            Self::WebrtcIceCandidate(_) => "webrtc_ice_candidate",
            Self::MarkNotificationRead(_) => "mark_notification_read",
            Self::MarkAllNotificationsRead => "mark_all_notifications_read",
            Self::PostLiked(_) => "post_liked",
            Self::PostCommented(_) => "post_commented",
        }
    }
}

/// Presence status carried by `presence-update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Every outbound event a connection can receive.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage {
        message: Message,
    },
    ConversationUpdated {
        conversation: Conversation,
    },
    UserTyping {
        conversation_id: Uuid,
        user_id: Uuid,
    },
    UserStopTyping {
        conversation_id: Uuid,
        user_id: Uuid,
    },
    NewNotification {
        notification: Notification,
    },
    NotificationsAllRead,
    #[serde(rename = "online-users")]
    OnlineUsers {
        user_ids: Vec<Uuid>,
    },
    #[serde(rename = "presence-update")]
    PresenceUpdate {
        user_id: Uuid,
        status: PresenceStatus,
    },
    CallInitiated {
        call: Call,
    },
    CallAccepted {
        call: Call,
    },
    CallRejected {
        call: Call,
    },
    CallEnded {
        call: Call,
    },
    WebrtcOffer {
        call_id: Uuid,
        sender_id: Uuid,
        payload: Value,
    },
    WebrtcAnswer {
        call_id: Uuid,
        sender_id: Uuid,
        payload: Value,
    },
    WebrtcIceCandidate {
        call_id: Uuid,
        sender_id: Uuid,
        payload: Value,
    },
    MessageError {
        kind: &'static str,
        message: String,
    },
    CallError {
        kind: &'static str,
        message: String,
    },
    NotificationError {
        kind: &'static str,
        message: String,
    },
}

impl ServerEvent {
    /// Event name for logging and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "new_message",
            Self::ConversationUpdated { .. } => "conversation_updated",
            Self::UserTyping { .. } => "user_typing",
            Self::UserStopTyping { .. } => "user_stop_typing",
            Self::NewNotification { .. } => "new_notification",
            Self::NotificationsAllRead => "notifications_all_read",
            Self::OnlineUsers { .. } => "online-users",
            Self::PresenceUpdate { .. } => "presence-update",
            Self::CallInitiated { .. } => "call_initiated",
            Self::CallAccepted { .. } => "call_accepted",
            Self::CallRejected { .. } => "call_rejected",
            Self::CallEnded { .. } => "call_ended",
            Self::WebrtcOffer { .. } => "webrtc_offer",
            Self::WebrtcAnswer { .. } => "webrtc_answer",
            Self::WebrtcIceCandidate { .. } => "webrtc_ice_candidate",
            Self::MessageError { .. } => "message_error",
            Self::CallError { .. } => "call_error",
            Self::NotificationError { .. } => "notification_error",
        }
    }
}
