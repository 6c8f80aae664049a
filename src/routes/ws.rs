//! WebSocket handler: one client session on the hub.
//!
//! DESIGN
//! ======
//! On upgrade, registers the connection and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall
//! - Room events queued by the hub → forward to client
//!
//! Handler functions call the connection service and return an `Outcome`.
//! The dispatch layer turns it into the reply frame; room fan-out is owned
//! by the connection service and the hub, never by this module.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (requires `?token=`) → send `session:connected`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch replies with done or error
//! 4. Close → `connection::close` disposes and reconciles presence/typing

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::routes::auth::authenticate;
use crate::services::auth::Identity;
use crate::services::connection;
use crate::services::registry::ConnectionId;
use crate::services::typing::TYPING_IDLE_TIMEOUT_MS;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("invalid json: {0}")]
    InvalidJson(String),
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
    #[error("{0} required")]
    MissingField(&'static str),
}

impl crate::frame::ErrorCode for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "E_INVALID_JSON",
            Self::UnknownSyscall(_) => "E_UNKNOWN_SYSCALL",
            Self::MissingField(_) => "E_BAD_REQUEST",
        }
    }
}

/// Result returned by handler functions.
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = params.get("token").map(|t| t.trim()).filter(|t| !t.is_empty()) else {
        return (StatusCode::UNAUTHORIZED, "token required").into_response();
    };

    let identity = match authenticate(&state, token).await {
        Ok(identity) => identity,
        Err(status) => return (status, "authentication failed").into_response(),
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, identity))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, identity: Identity) {
    let connection_id = Uuid::new_v4();

    // Per-connection queue for room events published by the hub.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.channel_capacity);
    connection::open(&state, connection_id, &identity, client_tx).await;

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("connection_id", connection_id.to_string())
        .with_data("user_id", identity.uid.clone())
        .with_data("typing_idle_ms", TYPING_IDLE_TIMEOUT_MS);
    if send_frame(&mut socket, &welcome).await.is_err() {
        connection::close(&state, connection_id).await;
        return;
    }

    info!(%connection_id, user_id = %identity.uid, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, connection_id, &identity, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    connection::close(&state, connection_id).await;
    info!(%connection_id, user_id = %identity.uid, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive dispatch directly.
async fn process_inbound_text(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: invalid inbound frame");
            let gateway = Frame::request("gateway:error", Data::new());
            return vec![gateway.error_from(&DispatchError::InvalidJson(e.to_string()))];
        }
    };

    // Stamp the authenticated user as `from`; client-supplied ids are ignored.
    req.from = Some(identity.uid.clone());
    info!(%connection_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.syscall.as_str() {
        "joinProject" => handle_join_project(state, connection_id, identity, &req).await,
        "leaveProject" => Ok(handle_leave_project(state, connection_id, identity).await),
        "joinUserRoom" => handle_join_user_room(state, connection_id, identity, &req).await,
        "userOnline" | "userOffline" => handle_presence(state, connection_id, identity, &req).await,
        "startTyping" | "stopTyping" => handle_typing(state, connection_id, identity, &req).await,
        other => Err(req.error_from(&DispatchError::UnknownSyscall(other.to_owned()))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// ROOM HANDLERS
// =============================================================================

async fn handle_join_project(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(project_id) = req.str_field("projectId") else {
        return Err(req.error_from(&DispatchError::MissingField("projectId")));
    };
    let room = connection::join_project(state, connection_id, identity, project_id).await;

    // Late joiners get the current rosters instead of waiting for the next signal.
    let mut data = room_data(&room.to_string());
    let online = state.presence.roster(&room).await;
    let typing = state.typing.roster(&room).await;
    data.insert("onlineUsers".into(), serde_json::to_value(&online).unwrap_or_default());
    data.insert("typingUsers".into(), serde_json::to_value(&typing).unwrap_or_default());
    Ok(Outcome::Reply(data))
}

async fn handle_leave_project(state: &AppState, connection_id: ConnectionId, identity: &Identity) -> Outcome {
    match connection::leave_project(state, connection_id, identity).await {
        Some(room) => Outcome::Reply(room_data(&room.to_string())),
        None => Outcome::Done,
    }
}

async fn handle_join_user_room(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let user_id = req.str_field("userId").unwrap_or(&identity.uid);
    match connection::join_user_room(state, connection_id, identity, user_id).await {
        Ok(room) => Ok(Outcome::Reply(room_data(&room.to_string()))),
        Err(e) => Err(req.error_from(&e)),
    }
}

// =============================================================================
// PRESENCE / TYPING HANDLERS
// =============================================================================

async fn handle_presence(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let project_id = req.str_field("projectId");
    if req.syscall == "userOffline" {
        return match connection::user_offline(state, connection_id, identity, project_id).await {
            Ok(()) => Ok(Outcome::Done),
            Err(e) => Err(req.error_from(&e)),
        };
    }

    let user_name = req.str_field("userName");
    match connection::user_online(state, connection_id, identity, project_id, user_name).await {
        Ok(roster) => {
            let mut data = Data::new();
            data.insert("users".into(), serde_json::to_value(&roster).unwrap_or_default());
            Ok(Outcome::Reply(data))
        }
        Err(e) => Err(req.error_from(&e)),
    }
}

async fn handle_typing(
    state: &AppState,
    connection_id: ConnectionId,
    identity: &Identity,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let project_id = req.str_field("projectId");
    let result = if req.syscall == "startTyping" {
        let user_name = req.str_field("userName");
        connection::start_typing(state, connection_id, identity, project_id, user_name)
            .await
            .map(|_| ())
    } else {
        connection::stop_typing(state, connection_id, identity, project_id).await
    };
    match result {
        Ok(()) => Ok(Outcome::Done),
        Err(e) => Err(req.error_from(&e)),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn room_data(room: &str) -> Data {
    let mut data = Data::new();
    data.insert("room".into(), serde_json::json!(room));
    data
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == crate::frame::Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        tracing::debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
