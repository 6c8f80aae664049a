//! Typing coordinator: transient "user is typing" sets per project room.
//!
//! The server holds no timers. Clients re-send `startTyping` while input
//! continues and fire `stopTyping` themselves after `TYPING_IDLE_TIMEOUT_MS`
//! of inactivity. Entries left behind by a vanished client are cleared when
//! its connection is disposed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::event::RoomId;

/// Client-side inactivity window before an automatic `stopTyping`.
pub const TYPING_IDLE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingState {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Clone, Default)]
pub struct TypingCoordinator {
    rooms: Arc<RwLock<HashMap<RoomId, BTreeMap<String, TypingState>>>>,
}

impl TypingCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or refresh a typing entry.
    pub async fn start(&self, room: &RoomId, user_id: &str, user_name: &str) -> TypingState {
        let state = TypingState { user_id: user_id.to_owned(), user_name: user_name.to_owned() };
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.clone())
            .or_default()
            .insert(user_id.to_owned(), state.clone());
        state
    }

    /// Remove a typing entry. Returns whether the user was typing.
    pub async fn stop(&self, room: &RoomId, user_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(typing) = rooms.get_mut(room) else {
            return false;
        };
        let removed = typing.remove(user_id).is_some();
        if typing.is_empty() {
            rooms.remove(room);
        }
        removed
    }

    /// Users currently typing in `room`, ordered by user id.
    pub async fn roster(&self, room: &RoomId) -> Vec<TypingState> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .map(|typing| typing.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
