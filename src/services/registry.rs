//! Connection registry: live connections and their room memberships.
//!
//! DESIGN
//! ======
//! Two maps behind one `RwLock`: connection → (sender, user, rooms) and
//! room → connection ids. Every mutation touches both sides under the same
//! write guard, so a `members_of` read never observes a half-applied join.
//!
//! Rooms have no explicit lifecycle: a room exists while it has members and
//! its entry is dropped as soon as the last member leaves.
//!
//! A connection holds at most one project room. Joining another project
//! room leaves the previous one; user rooms are not affected.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::event::RoomId;
use crate::frame::Frame;

pub type ConnectionId = Uuid;

// =============================================================================
// TYPES
// =============================================================================

struct ConnectionEntry {
    tx: mpsc::Sender<Frame>,
    user_id: Option<String>,
    rooms: HashSet<RoomId>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

/// Result of a `join` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    /// False when the connection is unknown (already disposed).
    pub joined: bool,
    /// Project room implicitly left to honour single-project membership.
    pub left: Option<RoomId>,
}

/// What `dispose` removed, for presence and typing reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposed {
    pub user_id: Option<String>,
    pub rooms: Vec<RoomId>,
}

#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened connection with its outbound channel.
    pub async fn register(&self, connection_id: ConnectionId, user_id: Option<String>, tx: mpsc::Sender<Frame>) {
        let mut inner = self.inner.write().await;
        inner
            .connections
            .insert(connection_id, ConnectionEntry { tx, user_id, rooms: HashSet::new() });
        debug!(%connection_id, connections = inner.connections.len(), "registry: connection registered");
    }

    /// Remove a connection from every room it joined and forget it.
    ///
    /// Returns `None` if the connection was never registered or was already
    /// disposed.
    pub async fn dispose(&self, connection_id: ConnectionId) -> Option<Disposed> {
        let mut inner = self.inner.write().await;
        let entry = inner.connections.remove(&connection_id)?;

        let mut rooms: Vec<RoomId> = entry.rooms.into_iter().collect();
        rooms.sort();
        for room in &rooms {
            inner.remove_member(room, connection_id);
        }

        info!(%connection_id, rooms = rooms.len(), "registry: connection disposed");
        Some(Disposed { user_id: entry.user_id, rooms })
    }
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

impl Registry {
    /// Add a connection to a room. Idempotent; unknown connections are ignored.
    pub async fn join(&self, connection_id: ConnectionId, room: RoomId) -> JoinOutcome {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let Some(entry) = inner.connections.get_mut(&connection_id) else {
            debug!(%connection_id, %room, "registry: join on unknown connection ignored");
            return JoinOutcome::default();
        };

        let mut left = None;
        if room.is_project() {
            let previous = entry
                .rooms
                .iter()
                .find(|r| r.is_project() && **r != room)
                .cloned();
            if let Some(previous) = previous {
                entry.rooms.remove(&previous);
                left = Some(previous);
            }
        }
        entry.rooms.insert(room.clone());

        if let Some(previous) = &left {
            inner.remove_member(previous, connection_id);
        }
        inner
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id);

        debug!(%connection_id, %room, left = ?left.as_ref().map(ToString::to_string), "registry: joined room");
        JoinOutcome { joined: true, left }
    }

    /// Remove a connection from a room. Returns whether it was a member.
    pub async fn leave(&self, connection_id: ConnectionId, room: &RoomId) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.connections.get_mut(&connection_id) else {
            return false;
        };
        if !entry.rooms.remove(room) {
            return false;
        }
        inner.remove_member(room, connection_id);
        debug!(%connection_id, %room, "registry: left room");
        true
    }

    /// Connection ids currently joined to `room`. Empty if the room has no members.
    pub async fn members_of(&self, room: &RoomId) -> HashSet<ConnectionId> {
        let inner = self.inner.read().await;
        inner.rooms.get(room).cloned().unwrap_or_default()
    }

    /// Outbound senders for `connections`. Ids disposed since the membership
    /// snapshot are skipped.
    pub(crate) async fn senders_for(&self, connections: &HashSet<ConnectionId>) -> Vec<(ConnectionId, mpsc::Sender<Frame>)> {
        let inner = self.inner.read().await;
        connections
            .iter()
            .filter_map(|id| inner.connections.get(id).map(|entry| (*id, entry.tx.clone())))
            .collect()
    }
}

// =============================================================================
// QUERIES
// =============================================================================

impl Registry {
    /// The project room this connection currently belongs to, if any.
    pub async fn project_room_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        let inner = self.inner.read().await;
        let entry = inner.connections.get(&connection_id)?;
        entry.rooms.iter().find(|r| r.is_project()).cloned()
    }

    pub async fn is_member(&self, connection_id: ConnectionId, room: &RoomId) -> bool {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(room)
            .is_some_and(|members| members.contains(&connection_id))
    }

    /// Whether any live connection of `user_id` is still joined to `room`.
    pub async fn user_has_connection_in(&self, room: &RoomId, user_id: &str) -> bool {
        let inner = self.inner.read().await;
        let Some(members) = inner.rooms.get(room) else {
            return false;
        };
        members.iter().any(|id| {
            inner
                .connections
                .get(id)
                .is_some_and(|entry| entry.user_id.as_deref() == Some(user_id))
        })
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}

impl RegistryInner {
    fn remove_member(&mut self, room: &RoomId, connection_id: ConnectionId) {
        let Some(members) = self.rooms.get_mut(room) else {
            return;
        };
        members.remove(&connection_id);
        if members.is_empty() {
            self.rooms.remove(room);
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
