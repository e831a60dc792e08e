//! Messaging Coordinator
//!
//! Validates conversation membership, persists messages, delivers them to
//! participants' live connections, and tracks read receipts and typing
//! indicators. Writes are serialized per conversation so recipients observe
//! messages in acceptance order; unrelated conversations never block each
//! other.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

use crate::application::events::{SendMessagePayload, ServerEvent};
use crate::application::registry::ConnectionRegistry;
use crate::application::services::notifications::{NotificationContext, NotificationFanout};
use crate::config::MessagingSettings;
use crate::domain::{
    Conversation, ConversationRepository, Message, MessageRepository, NotificationType,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

pub struct MessagingCoordinator {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifications: Arc<NotificationFanout>,
    registry: Arc<ConnectionRegistry>,
    settings: MessagingSettings,
    /// Per-conversation write locks; entries are created lazily and shared
    /// between concurrent senders of the same conversation.
    conversation_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MessagingCoordinator {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<NotificationFanout>,
        registry: Arc<ConnectionRegistry>,
        settings: MessagingSettings,
    ) -> Self {
        Self {
            conversations,
            messages,
            notifications,
            registry,
            settings,
            conversation_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, conversation_id: Uuid) -> Arc<Mutex<()>> {
        self.conversation_locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn conversation_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Conversation, AppError> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("conversation {}", conversation_id)))?;

        if !conversation.is_participant(user_id) {
            return Err(AppError::Forbidden(
                "not a participant of this conversation".into(),
            ));
        }
        Ok(conversation)
    }

    /// Persist and deliver a message.
    ///
    /// Delivery goes to every other participant's live connections; a
    /// `message` notification is raised for participants without a live
    /// connection joined to the conversation room (configurable via
    /// `messaging.notify_active_participants`).
    pub async fn send_message(
        &self,
        sender_id: Uuid,
        payload: SendMessagePayload,
    ) -> Result<Message, AppError> {
        payload
            .validate()
            .map_err(|e| AppError::ValidationFailed(e.to_string()))?;
        if payload.content.chars().count() > self.settings.max_content_length {
            return Err(AppError::ValidationFailed(format!(
                "content exceeds {} characters",
                self.settings.max_content_length
            )));
        }

        let conversation_id = payload.conversation_id;
        let lock = self.lock_for(conversation_id);
        let guard = lock.lock().await;
        let result = self.persist_and_deliver(sender_id, payload).await;
        drop(guard);

        // Evict the lock entry unless another sender holds a clone (map +
        // ours = 2); the shard lock makes the count check and removal atomic.
        self.conversation_locks
            .remove_if(&conversation_id, |_, lock| Arc::strong_count(lock) == 2);

        result
    }

    /// The lock-held section of `send_message`: membership check, persist,
    /// and fan-out.
    async fn persist_and_deliver(
        &self,
        sender_id: Uuid,
        payload: SendMessagePayload,
    ) -> Result<Message, AppError> {
        let mut conversation = self
            .conversation_for_participant(payload.conversation_id, sender_id)
            .await?;

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            sender_id,
            content: payload.content,
            message_type: payload.message_type,
            media_url: payload.media_url,
            deleted: false,
            created_at: Utc::now(),
        };
        self.messages.create(&message).await?;
        self.conversations
            .touch_last_message(conversation.id, message.id, message.created_at)
            .await?;
        conversation.last_message_id = Some(message.id);
        conversation.last_message_at = Some(message.created_at);

        let peers = conversation.peers_of(sender_id);
        let new_message = ServerEvent::NewMessage {
            message: message.clone(),
        };
        let mut delivered = 0;
        for peer in &peers {
            delivered += self.registry.emit_to_user(*peer, &new_message);
        }
        metrics::record_messages_delivered(delivered as u64);

        // Every participant's conversation list refreshes, sender included
        let updated = ServerEvent::ConversationUpdated {
            conversation: conversation.clone(),
        };
        self.registry.emit_to_users(&conversation.participants, &updated);

        for peer in &peers {
            let has_room_connection = self.registry.user_in_room(*peer, conversation.id);
            if has_room_connection && !self.settings.notify_active_participants {
                continue;
            }
            // A failed notification never rolls back the delivered message
            if let Err(e) = self
                .notifications
                .notify(
                    *peer,
                    NotificationType::Message,
                    sender_id,
                    NotificationContext::default(),
                    None,
                )
                .await
            {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    recipient = %peer,
                    error = %e,
                    "failed to persist message notification"
                );
            }
        }

        tracing::debug!(
            message_id = %message.id,
            conversation_id = %conversation.id,
            delivered,
            "message sent"
        );
        Ok(message)
    }

    /// Append read receipts for every message the user has not read yet.
    /// Idempotent; returns the number of receipts added.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, AppError> {
        self.conversation_for_participant(conversation_id, user_id)
            .await?;
        self.messages
            .mark_conversation_read(conversation_id, user_id)
            .await
    }

    /// Transient typing indicator; membership-checked, room-scoped, never
    /// persisted.
    pub async fn typing_start(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        self.conversation_for_participant(conversation_id, user_id)
            .await?;
        self.registry.emit_to_room(
            conversation_id,
            &ServerEvent::UserTyping {
                conversation_id,
                user_id,
            },
            Some(user_id),
        );
        Ok(())
    }

    /// Transient stop-typing indicator; membership-checked, room-scoped,
    /// never persisted.
    pub async fn typing_stop(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AppError> {
        self.conversation_for_participant(conversation_id, user_id)
            .await?;
        self.registry.emit_to_room(
            conversation_id,
            &ServerEvent::UserStopTyping {
                conversation_id,
                user_id,
            },
            Some(user_id),
        );
        Ok(())
    }

    /// Join a connection to the conversation room. Membership-checked; no
    /// history replay (clients fetch history from the store).
    pub async fn join_conversation(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<(), AppError> {
        self.conversation_for_participant(conversation_id, user_id)
            .await?;
        self.registry.join_room(connection_id, conversation_id);
        Ok(())
    }

    /// Remove a connection from the conversation room.
    pub fn leave_conversation(&self, connection_id: Uuid, conversation_id: Uuid) {
        self.registry.leave_room(connection_id, conversation_id);
    }

    /// Number of conversation lock entries currently held.
    pub fn active_lock_count(&self) -> usize {
        self.conversation_locks.len()
    }
}
