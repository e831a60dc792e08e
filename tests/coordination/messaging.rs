//! Messaging coordinator scenarios: delivery, notification de-dup,
//! membership checks, ordering, and read receipts.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use realtime_server::application::events::{SendMessagePayload, ServerEvent};
use realtime_server::application::registry::ConnectionRegistry;
use realtime_server::application::services::messaging::MessagingCoordinator;
use realtime_server::application::services::notifications::NotificationFanout;
use realtime_server::config::MessagingSettings;
use realtime_server::domain::{
    Message, MessageRepository, MessageType, NotificationType, ReadReceipt,
};
use realtime_server::shared::error::AppError;

use crate::common::{
    default_messaging_settings, direct_conversation, seed_direct_conversation, Harness,
    InMemoryConversations, InMemoryNotifications,
};

fn text_payload(conversation_id: Uuid, content: &str) -> SendMessagePayload {
    SendMessagePayload {
        conversation_id,
        content: content.to_string(),
        message_type: MessageType::Text,
        media_url: None,
    }
}

#[tokio::test]
async fn live_room_participant_gets_delivery_without_notification() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let mut bob_device = harness.connect_in_room(bob, conversation.id);

    let message = harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "hey"))
        .await
        .unwrap();

    let events = bob_device.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::NewMessage { message: m } if m.id == message.id && m.content == "hey"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::ConversationUpdated { conversation: c }
            if c.last_message_id == Some(message.id)
    )));
    assert!(harness.notifications_store.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn offline_participant_gets_a_notification_record() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "you there?"))
        .await
        .unwrap();

    assert_eq!(harness.messages.items.lock().unwrap().len(), 1);
    let notifications = harness.notifications_store.items.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].recipient_id, bob);
    assert_eq!(notifications[0].notification_type, NotificationType::Message);
    assert_eq!(notifications[0].actor_id, alice);
}

#[tokio::test]
async fn connected_but_outside_the_room_still_gets_both() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    // Bob is online but browsing elsewhere; no room join.
    let mut bob_device = harness.connect(bob);

    harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "ping"))
        .await
        .unwrap();

    let events = bob_device.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::NewMessage { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::NewNotification { .. })));
    assert_eq!(harness.notifications_store.items.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn one_room_device_suppresses_the_toast_for_all_devices() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let mut bob_desktop = harness.connect_in_room(bob, conversation.id);
    let mut bob_phone = harness.connect(bob);

    harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "hello"))
        .await
        .unwrap();

    // Both devices see the message, neither gets a notification record
    assert!(bob_desktop
        .drain()
        .iter()
        .any(|e| matches!(e, ServerEvent::NewMessage { .. })));
    assert!(bob_phone
        .drain()
        .iter()
        .any(|e| matches!(e, ServerEvent::NewMessage { .. })));
    assert!(harness.notifications_store.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn notify_active_participants_flag_keeps_the_toast() {
    let settings = MessagingSettings {
        notify_active_participants: true,
        max_content_length: 1000,
    };
    let harness = Harness::with_settings(settings, std::time::Duration::from_secs(30));
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let _bob_device = harness.connect_in_room(bob, conversation.id);

    harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "hello"))
        .await
        .unwrap();

    assert_eq!(harness.notifications_store.items.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn non_participant_send_is_forbidden_and_not_persisted() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mallory = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let mut bob_device = harness.connect_in_room(bob, conversation.id);

    let result = harness
        .messaging
        .send_message(mallory, text_payload(conversation.id, "let me in"))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(harness.messages.items.lock().unwrap().is_empty());
    assert!(bob_device.drain().is_empty());
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let harness = Harness::new();
    let result = harness
        .messaging
        .send_message(Uuid::new_v4(), text_payload(Uuid::new_v4(), "hi"))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn content_limits_are_enforced() {
    let settings = MessagingSettings {
        notify_active_participants: false,
        max_content_length: 10,
    };
    let harness = Harness::with_settings(settings, std::time::Duration::from_secs(30));
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let empty = harness
        .messaging
        .send_message(alice, text_payload(conversation.id, ""))
        .await;
    assert!(matches!(empty, Err(AppError::ValidationFailed(_))));

    let oversized = harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "this is far too long"))
        .await;
    assert!(matches!(oversized, Err(AppError::ValidationFailed(_))));
    assert!(harness.messages.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn recipients_observe_messages_in_send_order() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let mut bob_device = harness.connect_in_room(bob, conversation.id);

    for content in ["one", "two", "three"] {
        harness
            .messaging
            .send_message(alice, text_payload(conversation.id, content))
            .await
            .unwrap();
    }

    let received: Vec<String> = bob_device
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::NewMessage { message } => Some(message.content),
            _ => None,
        })
        .collect();
    assert_eq!(received, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn typing_reaches_room_members_but_not_the_typist() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let mut alice_device = harness.connect_in_room(alice, conversation.id);
    let mut bob_device = harness.connect_in_room(bob, conversation.id);

    harness
        .messaging
        .typing_start(conversation.id, alice)
        .await
        .unwrap();
    harness
        .messaging
        .typing_stop(conversation.id, alice)
        .await
        .unwrap();

    let events = bob_device.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::UserTyping { user_id, .. } if *user_id == alice
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::UserStopTyping { user_id, .. } if *user_id == alice
    )));
    assert!(alice_device.drain().is_empty());
    // Nothing persisted for transient indicators
    assert!(harness.messages.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn typing_requires_membership() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mallory = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    let mut bob_device = harness.connect_in_room(bob, conversation.id);

    let result = harness.messaging.typing_start(conversation.id, mallory).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let result = harness.messaging.typing_stop(conversation.id, mallory).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert!(bob_device.drain().is_empty());

    let unknown = harness.messaging.typing_start(Uuid::new_v4(), alice).await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn conversation_locks_are_released_after_each_send() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "hi"))
        .await
        .unwrap();
    assert_eq!(harness.messaging.active_lock_count(), 0);

    // Failed sends release their entry too
    let _ = harness
        .messaging
        .send_message(Uuid::new_v4(), text_payload(conversation.id, "nope"))
        .await;
    assert_eq!(harness.messaging.active_lock_count(), 0);
}

#[tokio::test]
async fn mark_read_is_idempotent_and_membership_checked() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = seed_direct_conversation(&harness, alice, bob);

    harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "a"))
        .await
        .unwrap();
    harness
        .messaging
        .send_message(alice, text_payload(conversation.id, "b"))
        .await
        .unwrap();

    assert_eq!(
        harness.messaging.mark_read(conversation.id, bob).await.unwrap(),
        2
    );
    assert_eq!(
        harness.messaging.mark_read(conversation.id, bob).await.unwrap(),
        0
    );
    // The sender never receipts their own messages
    assert_eq!(
        harness.messaging.mark_read(conversation.id, alice).await.unwrap(),
        0
    );

    let stranger = harness
        .messaging
        .mark_read(conversation.id, Uuid::new_v4())
        .await;
    assert!(matches!(stranger, Err(AppError::Forbidden(_))));
}

mock! {
    FailingMessages {}

    #[async_trait]
    impl MessageRepository for FailingMessages {
        async fn create(&self, message: &Message) -> Result<(), AppError>;
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Message>, AppError>;
        async fn mark_conversation_read(
            &self,
            conversation_id: Uuid,
            user_id: Uuid,
        ) -> Result<u64, AppError>;
        async fn read_receipts(&self, message_id: Uuid) -> Result<Vec<ReadReceipt>, AppError>;
    }
}

#[tokio::test]
async fn store_failure_surfaces_and_delivers_nothing() {
    let registry = Arc::new(ConnectionRegistry::new());
    let conversations = Arc::new(InMemoryConversations::default());
    let notifications = Arc::new(NotificationFanout::new(
        Arc::new(InMemoryNotifications::default()),
        registry.clone(),
    ));

    let mut messages = MockFailingMessages::new();
    messages
        .expect_create()
        .returning(|_| Err(AppError::StoreUnavailable("connection refused".into())));

    let coordinator = MessagingCoordinator::new(
        conversations.clone(),
        Arc::new(messages),
        notifications,
        registry.clone(),
        default_messaging_settings(),
    );

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let conversation = direct_conversation(alice, bob);
    conversations.insert(conversation.clone());

    let (tx, mut bob_rx) = tokio::sync::mpsc::unbounded_channel();
    let bob_conn = Uuid::new_v4();
    registry.register(bob, bob_conn, tx);

    let result = coordinator
        .send_message(alice, text_payload(conversation.id, "hi"))
        .await;

    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    assert!(bob_rx.try_recv().is_err());
    // Registry state survives the store failure
    assert!(registry.is_online(bob));
    assert_eq!(registry.connection_count(), 1);
}
