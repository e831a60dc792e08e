//! Connection Registry
//!
//! Maps authenticated users to their live connections and provides the
//! fan-out primitives every other component delivers through. The registry
//! is an owned, injected instance; the process can host several isolated
//! registries (tests do).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;

/// One live, authenticated transport session belonging to a user.
pub struct Connection {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<ServerEvent>,
    /// Conversation rooms this connection has joined
    rooms: RwLock<HashSet<Uuid>>,
}

impl Connection {
    /// Queue an event for delivery. Returns false when the connection is
    /// already gone; callers drop the event in that case.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Whether this connection has joined the given conversation room.
    pub fn in_room(&self, conversation_id: Uuid) -> bool {
        self.rooms.read().contains(&conversation_id)
    }
}

/// Presence transition caused by a registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// First connection for the user
    Online,
    /// Last connection for the user removed
    Offline,
    /// User had other live connections before and after
    Unchanged,
}

/// In-memory registry of live connections, user index, and room membership.
#[derive(Default)]
pub struct ConnectionRegistry {
    /// Active connections by connection id
    connections: DashMap<Uuid, Arc<Connection>>,
    /// User id to connection ids (one user may hold many devices)
    user_index: DashMap<Uuid, Vec<Uuid>>,
    /// Conversation room to connection ids
    rooms: DashMap<Uuid, HashSet<Uuid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; idempotent per connection id.
    pub fn register(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> PresenceTransition {
        if self.connections.contains_key(&connection_id) {
            return PresenceTransition::Unchanged;
        }

        let connection = Arc::new(Connection {
            connection_id,
            user_id,
            connected_at: Utc::now(),
            sender,
            rooms: RwLock::new(HashSet::new()),
        });
        self.connections.insert(connection_id, connection);

        let mut ids = self.user_index.entry(user_id).or_default();
        let first = ids.is_empty();
        ids.push(connection_id);

        tracing::info!(%user_id, %connection_id, "connection registered");

        if first {
            PresenceTransition::Online
        } else {
            PresenceTransition::Unchanged
        }
    }

    /// Remove a connection and its room memberships. Returns the owning
    /// user and the presence transition, or None for an unknown id.
    pub fn unregister(&self, connection_id: Uuid) -> Option<(Uuid, PresenceTransition)> {
        let (_, connection) = self.connections.remove(&connection_id)?;

        for room in connection.rooms.read().iter() {
            if let Some(mut members) = self.rooms.get_mut(room) {
                members.remove(&connection_id);
            }
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }

        let mut last = false;
        if let Some(mut ids) = self.user_index.get_mut(&connection.user_id) {
            ids.retain(|id| *id != connection_id);
            last = ids.is_empty();
        }
        if last {
            self.user_index.remove(&connection.user_id);
        }

        tracing::info!(
            user_id = %connection.user_id,
            %connection_id,
            "connection unregistered"
        );

        let transition = if last {
            PresenceTransition::Offline
        } else {
            PresenceTransition::Unchanged
        };
        Some((connection.user_id, transition))
    }

    /// Live connections for a user. An empty vec is not a fault: callers
    /// fall back to the store (the recipient reconciles on reconnect).
    pub fn connections_for(&self, user_id: Uuid) -> Vec<Arc<Connection>> {
        let Some(ids) = self.user_index.get(&user_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.connections.get(id).map(|c| c.clone()))
            .collect()
    }

    /// Whether the user has at least one live connection.
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.user_index
            .get(&user_id)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }

    /// All users with at least one live connection.
    pub fn online_users(&self) -> Vec<Uuid> {
        self.user_index.iter().map(|e| *e.key()).collect()
    }

    /// Deliver to every connection of one user. Returns delivered count.
    pub fn emit_to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for connection in self.connections_for(user_id) {
            if connection.send(event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver to every connection of several users.
    pub fn emit_to_users(&self, user_ids: &[Uuid], event: &ServerEvent) -> usize {
        user_ids
            .iter()
            .map(|id| self.emit_to_user(*id, event))
            .sum()
    }

    /// Deliver to every live connection.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for entry in self.connections.iter() {
            if entry.value().send(event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver to every connection joined to a conversation room,
    /// optionally excluding one user's connections (typing indicators skip
    /// the typist's own devices).
    pub fn emit_to_room(
        &self,
        conversation_id: Uuid,
        event: &ServerEvent,
        exclude_user: Option<Uuid>,
    ) -> usize {
        let Some(members) = self.rooms.get(&conversation_id) else {
            return 0;
        };
        let mut delivered = 0;
        for connection_id in members.iter() {
            if let Some(connection) = self.connections.get(connection_id) {
                if exclude_user == Some(connection.user_id) {
                    continue;
                }
                if connection.send(event.clone()) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Join a connection to a conversation room.
    pub fn join_room(&self, connection_id: Uuid, conversation_id: Uuid) {
        if let Some(connection) = self.connections.get(&connection_id) {
            connection.rooms.write().insert(conversation_id);
            self.rooms
                .entry(conversation_id)
                .or_default()
                .insert(connection_id);
        }
    }

    /// Remove a connection from a conversation room. A room whose last
    /// member leaves is dropped from the map entirely.
    pub fn leave_room(&self, connection_id: Uuid, conversation_id: Uuid) {
        if let Some(connection) = self.connections.get(&connection_id) {
            connection.rooms.write().remove(&conversation_id);
        }
        if let Some(mut members) = self.rooms.get_mut(&conversation_id) {
            members.remove(&connection_id);
        }
        self.rooms
            .remove_if(&conversation_id, |_, members| members.is_empty());
    }

    /// Whether any of the user's connections has joined the room. Drives
    /// the notification de-dup policy.
    pub fn user_in_room(&self, user_id: Uuid, conversation_id: Uuid) -> bool {
        self.connections_for(user_id)
            .iter()
            .any(|c| c.in_room(conversation_id))
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of conversation rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
