//! Event hub: fans a room event out to every member connection.
//!
//! DESIGN
//! ======
//! The hub owns no domain data. `publish` reads the room's members from the
//! registry, resolves their senders, serializes the event into one `Frame`, and `try_send`s a
//! clone into each connection's bounded queue. Sends never await, so a slow
//! client only loses its own copy.
//!
//! Per-connection queues are FIFO, which gives per-room ordering for events
//! published sequentially by one producer. Nothing orders events across
//! rooms.

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::event::Event;
use crate::frame::Frame;
use crate::services::registry::{ConnectionId, Registry};

#[derive(Clone)]
pub struct Hub {
    registry: Registry,
}

impl Hub {
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Deliver `event` to every member of its room.
    ///
    /// Returns the number of connections that accepted the event. A room with
    /// no members is a silent no-op.
    pub async fn publish(&self, event: &Event) -> usize {
        self.fan_out(event, None).await
    }

    /// Deliver `event` to every member of its room except `exclude`.
    pub async fn publish_except(&self, event: &Event, exclude: ConnectionId) -> usize {
        self.fan_out(event, Some(exclude)).await
    }

    async fn fan_out(&self, event: &Event, exclude: Option<ConnectionId>) -> usize {
        let members = self.registry.members_of(&event.room).await;
        if members.is_empty() {
            return 0;
        }
        let targets = self.registry.senders_for(&members).await;

        let frame = Frame::from(event);
        let mut delivered = 0;
        for (connection_id, tx) in targets {
            if exclude == Some(connection_id) {
                continue;
            }
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%connection_id, room = %event.room, kind = %event.kind, "hub: outbound queue full; event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%connection_id, room = %event.room, kind = %event.kind, "hub: connection closing; event dropped");
                }
            }
        }

        debug!(room = %event.room, kind = %event.kind, delivered, "hub: event published");
        delivered
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
