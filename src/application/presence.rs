//! Presence Tracker
//!
//! Derives online/offline state from registry transitions and publishes
//! deltas to each user's watcher set (their conversation peers) instead of
//! broadcasting to every connection.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use super::events::{PresenceStatus, ServerEvent};
use super::registry::ConnectionRegistry;

/// Tracks who is online and who should hear about it.
pub struct PresenceTracker {
    registry: Arc<ConnectionRegistry>,
    /// target user -> users watching them. Edges are symmetric because they
    /// come from shared conversations.
    watchers: DashMap<Uuid, HashSet<Uuid>>,
}

impl PresenceTracker {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            watchers: DashMap::new(),
        }
    }

    /// Record mutual watch edges between a user and their conversation
    /// peers. Called at connect time with the peers loaded from the store.
    pub fn subscribe_peers(&self, user_id: Uuid, peers: &[Uuid]) {
        for peer in peers {
            if *peer == user_id {
                continue;
            }
            self.watchers.entry(*peer).or_default().insert(user_id);
            self.watchers.entry(user_id).or_default().insert(*peer);
        }
    }

    /// Users watching `user_id`.
    fn watchers_of(&self, user_id: Uuid) -> Vec<Uuid> {
        self.watchers
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The watched users of `user_id` that are currently online; sent as
    /// the `online-users` snapshot to a freshly connected client.
    pub fn online_snapshot_for(&self, user_id: Uuid) -> Vec<Uuid> {
        self.watchers_of(user_id)
            .into_iter()
            .filter(|peer| self.registry.is_online(*peer))
            .collect()
    }

    /// Announce that a user came online. Returns the number of connections
    /// the delta reached.
    pub fn user_online(&self, user_id: Uuid) -> usize {
        let event = ServerEvent::PresenceUpdate {
            user_id,
            status: PresenceStatus::Online,
        };
        let watchers = self.watchers_of(user_id);
        tracing::debug!(%user_id, watcher_count = watchers.len(), "presence online");
        self.registry.emit_to_users(&watchers, &event)
    }

    /// Announce that a user went offline and prune their watch edges. The
    /// edges are rebuilt from the store on the next connect.
    pub fn user_offline(&self, user_id: Uuid) -> usize {
        let event = ServerEvent::PresenceUpdate {
            user_id,
            status: PresenceStatus::Offline,
        };
        let watchers = self.watchers_of(user_id);
        tracing::debug!(%user_id, watcher_count = watchers.len(), "presence offline");
        let delivered = self.registry.emit_to_users(&watchers, &event);

        self.watchers.remove(&user_id);
        for peer in watchers {
            if let Some(mut set) = self.watchers.get_mut(&peer) {
                set.remove(&user_id);
            }
            self.watchers.remove_if(&peer, |_, set| set.is_empty());
        }
        delivered
    }

    /// Number of users with a non-empty watcher set.
    pub fn watched_count(&self) -> usize {
        self.watchers.len()
    }
}
