//! Mutation-to-event bridge.
//!
//! DESIGN
//! ======
//! Called by the REST handlers only after a storage write has succeeded.
//! Each `Mutation` carries the document the store returned; the bridge maps
//! it to `(kind, room, payload)` and hands the event to the hub. It never
//! re-reads storage.
//!
//! ERROR HANDLING
//! ==============
//! `emit` never fails: a document that cannot be routed is logged and
//! dropped. The caller's HTTP response already reflects the successful write.

use serde_json::{Value, json};
use tracing::{debug, error};

use crate::event::{Event, EventKind, RoomId};
use crate::services::hub::Hub;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("{kind} document is missing string field `{field}`")]
    MissingField { kind: EventKind, field: &'static str },
}

impl crate::frame::ErrorCode for BridgeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "E_BRIDGE_MISSING_FIELD",
        }
    }
}

/// A successful storage mutation, carrying what the store returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    MessageCreated(Value),
    MessageEdited(Value),
    MessageDeleted { project_id: String, message_id: String },
    ReactionUpdated { project_id: String, message_id: String, reactions: Value },
    TaskCreated(Value),
    TaskUpdated(Value),
    TaskDeleted { project_id: String, task_id: String },
    TaskCommentAdded { project_id: String, task_id: String, comment: Value },
    NotificationCreated(Value),
}

impl Mutation {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageCreated(_) => EventKind::MessageCreated,
            Self::MessageEdited(_) => EventKind::MessageEdited,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::ReactionUpdated { .. } => EventKind::ReactionUpdated,
            Self::TaskCreated(_) => EventKind::TaskCreated,
            Self::TaskUpdated(_) => EventKind::TaskUpdated,
            Self::TaskDeleted { .. } => EventKind::TaskDeleted,
            Self::TaskCommentAdded { .. } => EventKind::TaskCommentAdded,
            Self::NotificationCreated(_) => EventKind::NotificationCreated,
        }
    }

    /// Map the mutation to the event the hub should publish.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` if a document lacks the id that selects its room.
    pub fn into_event(self) -> Result<Event, BridgeError> {
        let kind = self.kind();
        let (room, payload) = match self {
            Self::MessageCreated(doc) | Self::MessageEdited(doc) | Self::TaskCreated(doc) | Self::TaskUpdated(doc) => {
                (RoomId::project(string_field(&doc, kind, "projectId")?), doc)
            }
            Self::NotificationCreated(doc) => (RoomId::user(string_field(&doc, kind, "userId")?), doc),
            Self::MessageDeleted { project_id, message_id } => {
                (RoomId::project(project_id), json!({ "messageId": message_id }))
            }
            Self::ReactionUpdated { project_id, message_id, reactions } => {
                (RoomId::project(project_id), json!({ "messageId": message_id, "reactions": reactions }))
            }
            Self::TaskDeleted { project_id, task_id } => (RoomId::project(project_id), json!({ "taskId": task_id })),
            Self::TaskCommentAdded { project_id, task_id, comment } => {
                (RoomId::project(project_id), json!({ "taskId": task_id, "comment": comment }))
            }
        };
        Ok(Event::new(kind, room, payload))
    }
}

fn string_field(doc: &Value, kind: EventKind, field: &'static str) -> Result<String, BridgeError> {
    doc.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or(BridgeError::MissingField { kind, field })
}

#[derive(Clone)]
pub struct Bridge {
    hub: Hub,
}

impl Bridge {
    #[must_use]
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    /// Publish the event for a successful mutation. Failures are logged and
    /// swallowed. Returns the number of connections reached.
    pub async fn emit(&self, mutation: Mutation) -> usize {
        let kind = mutation.kind();
        match mutation.into_event() {
            Ok(event) => {
                let delivered = self.hub.publish(&event).await;
                debug!(%kind, room = %event.room, delivered, "bridge: mutation published");
                delivered
            }
            Err(e) => {
                error!(%kind, error = %e, "bridge: mutation could not be routed; event dropped");
                0
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
