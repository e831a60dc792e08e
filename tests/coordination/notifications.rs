//! Notification fan-out scenarios: self-suppression, defaults, read
//! tracking idempotence, and delivery.

use pretty_assertions::assert_eq;
use uuid::Uuid;

use realtime_server::application::events::ServerEvent;
use realtime_server::application::services::notifications::NotificationContext;
use realtime_server::domain::NotificationType;
use realtime_server::shared::error::AppError;

use crate::common::Harness;

#[tokio::test]
async fn self_notifications_are_suppressed() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();

    let result = harness
        .notifications
        .notify(
            alice,
            NotificationType::Like,
            alice,
            NotificationContext::default(),
            None,
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(harness.notifications_store.items.lock().unwrap().is_empty());
}

#[tokio::test]
async fn notify_persists_and_reaches_live_connections() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mut bob_device = harness.connect(bob);

    let notification = harness
        .notifications
        .notify(
            bob,
            NotificationType::Follow,
            alice,
            NotificationContext::default(),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(notification.message, "You have a new follower");
    assert_eq!(notification.link, format!("/profile/{}", alice));
    assert!(!notification.is_read);

    let events = bob_device.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::NewNotification { notification: n } if n.id == notification.id
    )));
}

#[tokio::test]
async fn caller_supplied_message_wins_over_the_default() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let post = Uuid::new_v4();

    let notification = harness
        .notifications
        .notify(
            bob,
            NotificationType::Comment,
            alice,
            NotificationContext {
                post_id: Some(post),
                comment_id: Some(Uuid::new_v4()),
            },
            Some("alice commented: nice".into()),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(notification.message, "alice commented: nice");
    assert_eq!(notification.link, format!("/post/{}", post));
}

#[tokio::test]
async fn mark_all_as_read_is_idempotent_with_one_broadcast_per_call() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let mut bob_device = harness.connect(bob);

    for notification_type in [NotificationType::Like, NotificationType::Follow] {
        harness
            .notifications
            .notify(bob, notification_type, alice, NotificationContext::default(), None)
            .await
            .unwrap();
    }
    bob_device.drain();

    assert_eq!(harness.notifications.unread_count(bob).await.unwrap(), 2);
    assert_eq!(harness.notifications.mark_all_as_read(bob).await.unwrap(), 2);
    assert_eq!(harness.notifications.unread_count(bob).await.unwrap(), 0);

    let broadcasts = bob_device
        .drain()
        .iter()
        .filter(|e| matches!(e, ServerEvent::NotificationsAllRead))
        .count();
    assert_eq!(broadcasts, 1);

    // Second call updates nothing but still tells the devices once
    assert_eq!(harness.notifications.mark_all_as_read(bob).await.unwrap(), 0);
    let broadcasts = bob_device
        .drain()
        .iter()
        .filter(|e| matches!(e, ServerEvent::NotificationsAllRead))
        .count();
    assert_eq!(broadcasts, 1);
}

#[tokio::test]
async fn mark_as_read_requires_ownership() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let notification = harness
        .notifications
        .notify(
            bob,
            NotificationType::Mention,
            alice,
            NotificationContext::default(),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    let other = harness
        .notifications
        .mark_as_read(notification.id, Uuid::new_v4())
        .await;
    assert!(matches!(other, Err(AppError::NotFound(_))));

    let read = harness
        .notifications
        .mark_as_read(notification.id, bob)
        .await
        .unwrap();
    assert!(read.is_read);
}

#[tokio::test]
async fn delete_removes_the_record() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let notification = harness
        .notifications
        .notify(
            bob,
            NotificationType::Share,
            alice,
            NotificationContext::default(),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    harness
        .notifications
        .delete(notification.id, bob)
        .await
        .unwrap();
    assert_eq!(harness.notifications.unread_count(bob).await.unwrap(), 0);
    assert!(harness.notifications_store.items.lock().unwrap().is_empty());
}
