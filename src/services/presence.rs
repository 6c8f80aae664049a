//! Presence tracker: who is online in each project room.
//!
//! DESIGN
//! ======
//! Per (project room, user) the state is ABSENT or ONLINE. `online` creates
//! or refreshes an entry, `offline` removes it, and connection disposal
//! removes it once the user has no live connection left in the room (the
//! caller checks the registry before calling `remove`).
//!
//! Consumers always receive the full roster, never a delta, so a client
//! that misses one update converges on the next.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::event::RoomId;
use crate::frame::now_ms;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: String,
    pub user_name: String,
    /// Milliseconds since Unix epoch of the latest `online` signal.
    pub last_seen_at: i64,
}

#[derive(Clone, Default)]
pub struct PresenceTracker {
    rooms: Arc<RwLock<HashMap<RoomId, BTreeMap<String, PresenceEntry>>>>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` online in `room` (or refresh `last_seen_at`) and return
    /// the full roster.
    pub async fn online(&self, room: &RoomId, user_id: &str, user_name: &str) -> Vec<PresenceEntry> {
        let mut rooms = self.rooms.write().await;
        let roster = rooms.entry(room.clone()).or_default();
        roster.insert(
            user_id.to_owned(),
            PresenceEntry { user_id: user_id.to_owned(), user_name: user_name.to_owned(), last_seen_at: now_ms() },
        );
        roster.values().cloned().collect()
    }

    /// Mark `user_id` absent in `room`.
    ///
    /// Returns the updated roster if the user was online, `None` otherwise.
    pub async fn remove(&self, room: &RoomId, user_id: &str) -> Option<Vec<PresenceEntry>> {
        let mut rooms = self.rooms.write().await;
        let roster = rooms.get_mut(room)?;
        roster.remove(user_id)?;
        let remaining: Vec<PresenceEntry> = roster.values().cloned().collect();
        if remaining.is_empty() {
            rooms.remove(room);
        }
        Some(remaining)
    }

    /// Current online set for `room`, ordered by user id.
    pub async fn roster(&self, room: &RoomId) -> Vec<PresenceEntry> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .map(|roster| roster.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
