//! WebSocket Connection Handler
//!
//! The transport gateway: authenticates the handshake, registers the
//! connection, and dispatches typed inbound events to the coordination
//! components. This is the only module aware of the wire envelope.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::events::{ClientEvent, ServerEvent};
use crate::application::registry::PresenceTransition;
use crate::application::services::calls::SignalKind;
use crate::application::services::notifications::NotificationContext;
use crate::domain::NotificationType;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Handshake query parameters
#[derive(Debug, Deserialize)]
pub struct GatewayParams {
    token: String,
}

/// Inbound wire envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// WebSocket upgrade handler. The token is verified before the upgrade;
/// a bad token refuses the connection outright.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<GatewayParams>,
    State(state): State<AppState>,
) -> Response {
    let user_id = match state.auth.verify(&params.token).await {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(error = %e, "gateway handshake refused");
            return e.into_response();
        }
    };

    let max_message_size = state.settings.websocket.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// Drive one authenticated connection until it closes.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();

    // Outbound events funnel through this channel; the forwarder task owns
    // the socket sink.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize outbound event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let transition = state.registry.register(user_id, connection_id, tx.clone());
    metrics::WS_CONNECTIONS_ACTIVE.inc();

    // Build the presence watch set from the user's conversation peers and
    // hand the client its online snapshot.
    match state.conversations.find_by_participant(user_id).await {
        Ok(conversations) => {
            let peers: Vec<Uuid> = conversations
                .iter()
                .flat_map(|c| c.peers_of(user_id))
                .collect();
            state.presence.subscribe_peers(user_id, &peers);
        }
        Err(e) => {
            tracing::warn!(%user_id, error = %e, "failed to load conversation peers");
        }
    }
    if transition == PresenceTransition::Online {
        state.presence.user_online(user_id);
    }
    let _ = tx.send(ServerEvent::OnlineUsers {
        user_ids: state.presence.online_snapshot_for(user_id),
    });

    tracing::info!(%user_id, %connection_id, "user connected");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_frame(&text, &state, user_id, connection_id, &tx).await;
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(%connection_id, "connection closed by client");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => {}
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "websocket error");
                break;
            }
        }
    }

    // Cleanup: rooms are released by unregister; the last connection going
    // away announces offline and hangs up dangling calls.
    if let Some((_, PresenceTransition::Offline)) = state.registry.unregister(connection_id) {
        state.presence.user_offline(user_id);
        state.calls.end_all_for_user(user_id).await;
    }
    metrics::WS_CONNECTIONS_ACTIVE.dec();
    sender_task.abort();

    tracing::info!(%user_id, %connection_id, "user disconnected");
}

/// Parse a wire frame and dispatch it. Unknown event names are dropped
/// silently; malformed payloads of known events answer with a typed
/// `*_error` to this connection only.
async fn handle_frame(
    text: &str,
    state: &AppState,
    user_id: Uuid,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(%connection_id, error = %e, "unparseable frame dropped");
            return;
        }
    };

    let event = match ClientEvent::parse(&envelope.event, envelope.data) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::trace!(event = %envelope.event, "unknown event dropped");
            return;
        }
        Err(e) => {
            let err = AppError::ValidationFailed(e.to_string());
            let _ = tx.send(error_event(&envelope.event, &err));
            return;
        }
    };

    metrics::record_gateway_event(event.name());
    let name = event.name();
    if let Err(err) = dispatch(event, state, user_id, connection_id).await {
        tracing::debug!(%connection_id, event = name, error = %err, "event failed");
        let _ = tx.send(error_event(name, &err));
    }
}

/// Route a typed event to its component.
async fn dispatch(
    event: ClientEvent,
    state: &AppState,
    user_id: Uuid,
    connection_id: Uuid,
) -> Result<(), AppError> {
    match event {
        ClientEvent::JoinConversation(p) => {
            state
                .messaging
                .join_conversation(connection_id, user_id, p.conversation_id)
                .await?;
        }
        ClientEvent::LeaveConversation(p) => {
            state
                .messaging
                .leave_conversation(connection_id, p.conversation_id);
        }
        ClientEvent::SendMessage(p) => {
            state.messaging.send_message(user_id, p).await?;
        }
        ClientEvent::TypingStart(p) => {
            state
                .messaging
                .typing_start(p.conversation_id, user_id)
                .await?;
        }
        ClientEvent::TypingStop(p) => {
            state
                .messaging
                .typing_stop(p.conversation_id, user_id)
                .await?;
        }
        ClientEvent::MarkConversationRead(p) => {
            state.messaging.mark_read(p.conversation_id, user_id).await?;
        }
        ClientEvent::CallInitiate(p) => {
            state
                .calls
                .initiate_call(user_id, p.recipient_id, p.call_type)
                .await?;
        }
        ClientEvent::CallAccept(p) => {
            state.calls.accept_call(p.call_id, user_id).await?;
        }
        ClientEvent::CallReject(p) => {
            state.calls.reject_call(p.call_id, user_id).await?;
        }
        ClientEvent::CallEnd(p) => {
            state.calls.end_call(p.call_id, user_id).await?;
        }
        ClientEvent::WebrtcOffer(p) => {
            state
                .calls
                .relay(SignalKind::Offer, p.call_id, user_id, p.target_user_id, p.payload)
                .await?;
        }
        ClientEvent::WebrtcAnswer(p) => {
            state
                .calls
                .relay(SignalKind::Answer, p.call_id, user_id, p.target_user_id, p.payload)
                .await?;
        }
        ClientEvent::WebrtcIceCandidate(p) => {
            state
                .calls
                .relay(
                    SignalKind::IceCandidate,
                    p.call_id,
                    user_id,
                    p.target_user_id,
                    p.payload,
                )
                .await?;
        }
        ClientEvent::MarkNotificationRead(p) => {
            state
                .notifications
                .mark_as_read(p.notification_id, user_id)
                .await?;
        }
        ClientEvent::MarkAllNotificationsRead => {
            state.notifications.mark_all_as_read(user_id).await?;
        }
        ClientEvent::PostLiked(p) => {
            state
                .notifications
                .notify(
                    p.post_author_id,
                    NotificationType::Like,
                    user_id,
                    NotificationContext {
                        post_id: Some(p.post_id),
                        comment_id: None,
                    },
                    None,
                )
                .await?;
        }
        ClientEvent::PostCommented(p) => {
            state
                .notifications
                .notify(
                    p.post_author_id,
                    NotificationType::Comment,
                    user_id,
                    NotificationContext {
                        post_id: Some(p.post_id),
                        comment_id: p.comment_id,
                    },
                    None,
                )
                .await?;
        }
    }
    Ok(())
}

/// Map a failed event to the component-appropriate `*_error`.
fn error_event(event_name: &str, err: &AppError) -> ServerEvent {
    let kind = err.kind();
    let message = err.to_string();
    if event_name.starts_with("call") || event_name.starts_with("webrtc") {
        ServerEvent::CallError { kind, message }
    } else if event_name.contains("notification") || event_name.starts_with("post") {
        ServerEvent::NotificationError { kind, message }
    } else {
        ServerEvent::MessageError { kind, message }
    }
}
