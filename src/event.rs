//! Rooms and room events.
//!
//! DESIGN
//! ======
//! A room is a named broadcast group and is never persisted. Two kinds
//! exist: `project:<projectId>` and `user:<userId>`. An `Event` is an
//! immutable payload addressed to exactly one room; the hub turns it into a
//! single outbound `Frame` and clones that to every member.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::{Data, Frame, now_ms};

// =============================================================================
// ROOM ID
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("invalid room id: {0}")]
    InvalidRoom(String),
}

impl crate::frame::ErrorCode for EventError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRoom(_) => "E_INVALID_ROOM",
        }
    }
}

/// Identifier of a broadcast room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoomId {
    Project(String),
    User(String),
}

impl RoomId {
    pub fn project(project_id: impl Into<String>) -> Self {
        Self::Project(project_id.into())
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self::User(user_id.into())
    }

    #[must_use]
    pub fn is_project(&self) -> bool {
        matches!(self, Self::Project(_))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(id) => write!(f, "project:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl FromStr for RoomId {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, id)) = s.split_once(':') else {
            return Err(EventError::InvalidRoom(s.to_owned()));
        };
        if id.is_empty() {
            return Err(EventError::InvalidRoom(s.to_owned()));
        }
        match kind {
            "project" => Ok(Self::Project(id.to_owned())),
            "user" => Ok(Self::User(id.to_owned())),
            _ => Err(EventError::InvalidRoom(s.to_owned())),
        }
    }
}

// =============================================================================
// EVENT KIND
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    MessageCreated,
    MessageEdited,
    MessageDeleted,
    ReactionUpdated,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskCommentAdded,
    NotificationCreated,
    PresenceUpdated,
    TypingStarted,
    TypingStopped,
}

impl EventKind {
    /// Stable kebab-case name carried in the frame's `kind` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageCreated => "message-created",
            Self::MessageEdited => "message-edited",
            Self::MessageDeleted => "message-deleted",
            Self::ReactionUpdated => "reaction-updated",
            Self::TaskCreated => "task-created",
            Self::TaskUpdated => "task-updated",
            Self::TaskDeleted => "task-deleted",
            Self::TaskCommentAdded => "task-comment-added",
            Self::NotificationCreated => "notification-created",
            Self::PresenceUpdated => "presence-updated",
            Self::TypingStarted => "typing-started",
            Self::TypingStopped => "typing-stopped",
        }
    }

    /// Client-facing event name, used as the outbound frame syscall.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::MessageCreated => "receiveMessage",
            Self::MessageEdited => "messageEdited",
            Self::MessageDeleted => "messageDeleted",
            Self::ReactionUpdated => "messageReactionUpdated",
            Self::TaskCreated => "taskCreated",
            Self::TaskUpdated => "taskUpdated",
            Self::TaskDeleted => "taskDeleted",
            Self::TaskCommentAdded => "taskCommentAdded",
            Self::NotificationCreated => "newNotification",
            Self::PresenceUpdated => "onlineUsersUpdate",
            Self::TypingStarted => "userTyping",
            Self::TypingStopped => "userStoppedTyping",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// EVENT
// =============================================================================

/// Immutable fan-out message: `{kind, room, payload, emittedAt}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub room: RoomId,
    pub payload: Value,
    /// Milliseconds since Unix epoch.
    pub emitted_at: i64,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, room: RoomId, payload: Value) -> Self {
        Self { kind, room, payload, emitted_at: now_ms() }
    }
}

impl From<&Event> for Frame {
    fn from(event: &Event) -> Self {
        let mut data = Data::new();
        data.insert("kind".into(), Value::String(event.kind.as_str().into()));
        data.insert("payload".into(), event.payload.clone());
        Frame::request(event.kind.wire_name(), data)
            .with_room(event.room.to_string())
            .with_ts(event.emitted_at)
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
