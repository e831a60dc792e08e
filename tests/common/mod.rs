//! Common Test Utilities
//!
//! In-memory implementations of the store collaborator traits plus a
//! harness that wires the coordination components the way `startup` does,
//! with capture channels standing in for live connections.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use realtime_server::application::events::ServerEvent;
use realtime_server::application::presence::PresenceTracker;
use realtime_server::application::registry::ConnectionRegistry;
use realtime_server::application::services::calls::CallSignaling;
use realtime_server::application::services::messaging::MessagingCoordinator;
use realtime_server::application::services::notifications::NotificationFanout;
use realtime_server::config::MessagingSettings;
use realtime_server::domain::{
    Call, CallRepository, Conversation, ConversationRepository, Message, MessageRepository,
    Notification, NotificationRepository, ReadReceipt,
};
use realtime_server::shared::error::AppError;

/// In-memory conversation store.
#[derive(Default)]
pub struct InMemoryConversations {
    pub items: Mutex<HashMap<Uuid, Conversation>>,
}

impl InMemoryConversations {
    pub fn insert(&self, conversation: Conversation) {
        self.items
            .lock()
            .unwrap()
            .insert(conversation.id, conversation);
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversations {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_participant(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect())
    }

    async fn touch_last_message(
        &self,
        id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(conversation) = self.items.lock().unwrap().get_mut(&id) {
            conversation.last_message_id = Some(message_id);
            conversation.last_message_at = Some(at);
        }
        Ok(())
    }
}

/// In-memory message store with read receipts.
#[derive(Default)]
pub struct InMemoryMessages {
    pub items: Mutex<Vec<Message>>,
    pub receipts: Mutex<HashMap<Uuid, Vec<ReadReceipt>>>,
}

#[async_trait]
impl MessageRepository for InMemoryMessages {
    async fn create(&self, message: &Message) -> Result<(), AppError> {
        self.items.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, AppError> {
        let messages = self.items.lock().unwrap();
        let mut receipts = self.receipts.lock().unwrap();
        let mut added = 0;
        for message in messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && m.sender_id != user_id)
        {
            let entry = receipts.entry(message.id).or_default();
            if !entry.iter().any(|r| r.user_id == user_id) {
                entry.push(ReadReceipt {
                    user_id,
                    read_at: Utc::now(),
                });
                added += 1;
            }
        }
        Ok(added)
    }

    async fn read_receipts(&self, message_id: Uuid) -> Result<Vec<ReadReceipt>, AppError> {
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .get(&message_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory notification store.
#[derive(Default)]
pub struct InMemoryNotifications {
    pub items: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationRepository for InMemoryNotifications {
    async fn create(&self, notification: &Notification) -> Result<(), AppError> {
        self.items.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn mark_as_read(
        &self,
        id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Notification>, AppError> {
        let mut items = self.items.lock().unwrap();
        for notification in items.iter_mut() {
            if notification.id == id && notification.recipient_id == recipient_id {
                notification.is_read = true;
                return Ok(Some(notification.clone()));
            }
        }
        Ok(None)
    }

    async fn mark_all_as_read(&self, recipient_id: Uuid) -> Result<u64, AppError> {
        let mut items = self.items.lock().unwrap();
        let mut updated = 0;
        for notification in items.iter_mut() {
            if notification.recipient_id == recipient_id && !notification.is_read {
                notification.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn unread_count(&self, recipient_id: Uuid) -> Result<u64, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as u64)
    }

    async fn delete(&self, id: Uuid, recipient_id: Uuid) -> Result<(), AppError> {
        self.items
            .lock()
            .unwrap()
            .retain(|n| !(n.id == id && n.recipient_id == recipient_id));
        Ok(())
    }
}

/// In-memory call store.
#[derive(Default)]
pub struct InMemoryCalls {
    pub items: Mutex<HashMap<Uuid, Call>>,
}

#[async_trait]
impl CallRepository for InMemoryCalls {
    async fn create(&self, call: &Call) -> Result<(), AppError> {
        self.items.lock().unwrap().insert(call.id, call.clone());
        Ok(())
    }

    async fn finalize(&self, call: &Call) -> Result<(), AppError> {
        self.items.lock().unwrap().insert(call.id, call.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, AppError> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }
}

/// A fake connected device: the receiver captures everything the server
/// would have written to the socket.
pub struct Device {
    pub user_id: Uuid,
    pub connection_id: Uuid,
    pub rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Device {
    /// Drain everything queued so far.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// The coordination components wired together over in-memory stores.
pub struct Harness {
    pub registry: Arc<ConnectionRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub conversations: Arc<InMemoryConversations>,
    pub messages: Arc<InMemoryMessages>,
    pub notifications_store: Arc<InMemoryNotifications>,
    pub calls_store: Arc<InMemoryCalls>,
    pub notifications: Arc<NotificationFanout>,
    pub messaging: Arc<MessagingCoordinator>,
    pub calls: Arc<CallSignaling>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(default_messaging_settings(), Duration::from_secs(30))
    }

    pub fn with_ring_timeout(ring_timeout: Duration) -> Self {
        Self::with_settings(default_messaging_settings(), ring_timeout)
    }

    pub fn with_settings(settings: MessagingSettings, ring_timeout: Duration) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = Arc::new(PresenceTracker::new(registry.clone()));
        let conversations = Arc::new(InMemoryConversations::default());
        let messages = Arc::new(InMemoryMessages::default());
        let notifications_store = Arc::new(InMemoryNotifications::default());
        let calls_store = Arc::new(InMemoryCalls::default());

        let notifications = Arc::new(NotificationFanout::new(
            notifications_store.clone(),
            registry.clone(),
        ));
        let messaging = Arc::new(MessagingCoordinator::new(
            conversations.clone(),
            messages.clone(),
            notifications.clone(),
            registry.clone(),
            settings,
        ));
        let calls = Arc::new(CallSignaling::new(
            calls_store.clone(),
            registry.clone(),
            ring_timeout,
        ));

        Self {
            registry,
            presence,
            conversations,
            messages,
            notifications_store,
            calls_store,
            notifications,
            messaging,
            calls,
        }
    }

    /// Register a fake device for a user.
    pub fn connect(&self, user_id: Uuid) -> Device {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.registry.register(user_id, connection_id, tx);
        Device {
            user_id,
            connection_id,
            rx,
        }
    }

    /// Register a device and join it to a conversation room.
    pub fn connect_in_room(&self, user_id: Uuid, conversation_id: Uuid) -> Device {
        let device = self.connect(user_id);
        self.registry.join_room(device.connection_id, conversation_id);
        device
    }
}

pub fn default_messaging_settings() -> MessagingSettings {
    MessagingSettings {
        notify_active_participants: false,
        max_content_length: 1000,
    }
}

/// A direct conversation between two users.
pub fn direct_conversation(a: Uuid, b: Uuid) -> Conversation {
    Conversation {
        id: Uuid::new_v4(),
        participants: vec![a, b],
        is_group: false,
        group_name: None,
        last_message_id: None,
        last_message_at: None,
        created_at: Utc::now(),
    }
}

/// A direct conversation between two users, seeded into the store.
pub fn seed_direct_conversation(harness: &Harness, a: Uuid, b: Uuid) -> Conversation {
    let conversation = direct_conversation(a, b);
    harness.conversations.insert(conversation.clone());
    conversation
}
