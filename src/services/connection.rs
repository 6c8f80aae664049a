//! Connection service: lifecycle of one client session across the hub.
//!
//! DESIGN
//! ======
//! The websocket handler calls into this module for every inbound signal.
//! Each function updates the registry, presence or typing state and then
//! publishes the resulting room event through the hub. Nothing here touches
//! the socket.
//!
//! LIFECYCLE
//! =========
//! 1. `open` registers the connection with its verified user
//! 2. `join_project` / `join_user_room` / `leave_project` move it between rooms
//! 3. presence and typing signals publish into its project room
//! 4. `close` disposes it and reconciles presence and typing for every
//!    project room it left

use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;

use crate::event::{Event, EventKind, RoomId};
use crate::frame::Frame;
use crate::services::auth::Identity;
use crate::services::presence::PresenceEntry;
use crate::services::registry::ConnectionId;
use crate::services::typing::TypingState;
use crate::state::AppState;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("not a member of {0}")]
    NotMember(RoomId),
    #[error("no project room joined")]
    NoProjectRoom,
    #[error("cannot join another user's room: {0}")]
    ForeignUserRoom(String),
}

impl crate::frame::ErrorCode for ConnectionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotMember(_) => "E_NOT_MEMBER",
            Self::NoProjectRoom => "E_NO_PROJECT_ROOM",
            Self::ForeignUserRoom(_) => "E_FORBIDDEN",
        }
    }
}

// =============================================================================
// OPEN / CLOSE
// =============================================================================

pub async fn open(state: &AppState, connection_id: ConnectionId, identity: &Identity, tx: mpsc::Sender<Frame>) {
    state
        .registry
        .register(connection_id, Some(identity.uid.clone()), tx)
        .await;
}

/// Dispose the connection. Must run exactly once, when the socket closes.
pub async fn close(state: &AppState, connection_id: ConnectionId) {
    let Some(disposed) = state.registry.dispose(connection_id).await else {
        return;
    };
    let Some(user_id) = disposed.user_id else {
        return;
    };
    for room in disposed.rooms.iter().filter(|r| r.is_project()) {
        reconcile_departure(state, room, &user_id).await;
    }
}

// =============================================================================
// ROOMS
// =============================================================================

/// Join `project:<project_id>`, leaving the previous project room.
pub async fn join_project(state: &AppState, connection_id: ConnectionId, identity: &Identity, project_id: &str) -> RoomId {
    let room = RoomId::project(project_id);
    let outcome = state.registry.join(connection_id, room.clone()).await;
    if let Some(left) = outcome.left {
        reconcile_departure(state, &left, &identity.uid).await;
    }
    info!(%connection_id, user_id = %identity.uid, %room, "connection: joined project");
    room
}

/// Leave the current project room, if any.
pub async fn leave_project(state: &AppState, connection_id: ConnectionId, identity: &Identity) -> Option<RoomId> {
    let room = state.registry.project_room_of(connection_id).await?;
    if state.registry.leave(connection_id, &room).await {
        reconcile_departure(state, &room, &identity.uid).await;
    }
    Some(room)
}

/// Join the personal notification room. Only the caller's own room is allowed.
///
/// # Errors
///
/// Returns `ForeignUserRoom` when `user_id` is not the authenticated user.
pub async fn join_user_room(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    user_id: &str,
) -> Result<RoomId, ConnectionError> {
    if user_id != identity.uid {
        return Err(ConnectionError::ForeignUserRoom(user_id.to_owned()));
    }
    let room = RoomId::user(user_id);
    state.registry.join(connection_id, room.clone()).await;
    info!(%connection_id, %room, "connection: joined user room");
    Ok(room)
}

// =============================================================================
// PRESENCE
// =============================================================================

/// Mark the user online and publish the full roster to the room.
///
/// # Errors
///
/// Returns an error if the connection is not in the target project room.
pub async fn user_online(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    project_id: Option<&str>,
    user_name: Option<&str>,
) -> Result<Vec<PresenceEntry>, ConnectionError> {
    let room = resolve_project_room(state, connection_id, project_id).await?;
    let name = user_name.unwrap_or(&identity.name);
    let roster = state.presence.online(&room, &identity.uid, name).await;
    publish_roster(state, room, &roster).await;
    Ok(roster)
}

/// Mark the user offline. Publishes only if the user was online.
///
/// # Errors
///
/// Returns an error if the connection is not in the target project room.
pub async fn user_offline(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    project_id: Option<&str>,
) -> Result<(), ConnectionError> {
    let room = resolve_project_room(state, connection_id, project_id).await?;
    if let Some(roster) = state.presence.remove(&room, &identity.uid).await {
        publish_roster(state, room, &roster).await;
    }
    Ok(())
}

async fn publish_roster(state: &AppState, room: RoomId, roster: &[PresenceEntry]) {
    let event = Event::new(EventKind::PresenceUpdated, room, json!(roster));
    state.hub.publish(&event).await;
}

// =============================================================================
// TYPING
// =============================================================================

/// Record the user as typing and notify the other members of the room.
///
/// # Errors
///
/// Returns an error if the connection is not in the target project room.
pub async fn start_typing(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    project_id: Option<&str>,
    user_name: Option<&str>,
) -> Result<TypingState, ConnectionError> {
    let room = resolve_project_room(state, connection_id, project_id).await?;
    let name = user_name.unwrap_or(&identity.name);
    let typing = state.typing.start(&room, &identity.uid, name).await;
    let event = Event::new(EventKind::TypingStarted, room, json!(typing));
    state.hub.publish_except(&event, connection_id).await;
    Ok(typing)
}

/// Clear the user's typing entry and notify the other members of the room.
///
/// # Errors
///
/// Returns an error if the connection is not in the target project room.
pub async fn stop_typing(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    project_id: Option<&str>,
) -> Result<(), ConnectionError> {
    let room = resolve_project_room(state, connection_id, project_id).await?;
    state.typing.stop(&room, &identity.uid).await;
    let event = Event::new(EventKind::TypingStopped, room, json!({ "userId": identity.uid }));
    state.hub.publish_except(&event, connection_id).await;
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

/// Resolve the project room a signal targets and check membership.
async fn resolve_project_room(
    state: &AppState,
    connection_id: ConnectionId,
    project_id: Option<&str>,
) -> Result<RoomId, ConnectionError> {
    let room = match project_id {
        Some(id) => RoomId::project(id),
        None => state
            .registry
            .project_room_of(connection_id)
            .await
            .ok_or(ConnectionError::NoProjectRoom)?,
    };
    if !state.registry.is_member(connection_id, &room).await {
        return Err(ConnectionError::NotMember(room));
    }
    Ok(room)
}

/// A user's connection left `room`. If none of their connections remain
/// there, drop their presence and typing entries and tell the room.
async fn reconcile_departure(state: &AppState, room: &RoomId, user_id: &str) {
    if state.registry.user_has_connection_in(room, user_id).await {
        return;
    }
    if let Some(roster) = state.presence.remove(room, user_id).await {
        publish_roster(state, room.clone(), &roster).await;
    }
    if state.typing.stop(room, user_id).await {
        let event = Event::new(EventKind::TypingStopped, room.clone(), json!({ "userId": user_id }));
        state.hub.publish(&event).await;
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
