//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the websocket endpoint and the REST mutation routes under a single
//! Axum router. Mutation handlers write through the document store and hand
//! successful writes to the bridge; the websocket handler feeds the
//! connection service.

pub mod auth;
pub mod messages;
pub mod notifications;
pub mod tasks;
pub mod ws;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Json;
use axum::routing::{get, post, put};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::frame::ErrorCode;
use crate::services::store::StoreError;
use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState, frontend_url: Option<&str>) -> Router {
    Router::new()
        .route("/api/projects/{project_id}/messages", post(messages::create_message))
        .route("/api/messages/{id}", put(messages::edit_message).delete(messages::delete_message))
        .route("/api/messages/{id}/reactions", post(messages::toggle_reaction))
        .route("/api/projects/{project_id}/tasks", post(tasks::create_task))
        .route("/api/tasks/{id}", put(tasks::update_task).delete(tasks::delete_task))
        .route("/api/tasks/{id}/comments", post(tasks::add_comment))
        .route("/api/notifications", post(notifications::create_notification))
        .route("/api/health", get(health))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors_layer(frontend_url))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span carrying the path only. The websocket token rides in the
/// query string and must not reach the logs.
fn request_span(req: &Request) -> tracing::Span {
    tracing::info_span!("request", method = %req.method(), path = %req.uri().path())
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let Some(origin) = frontend_url else {
        return layer.allow_origin(Any);
    };
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(%origin, error = %e, "invalid FRONTEND_URL; allowing any origin");
            layer.allow_origin(Any)
        }
    }
}

/// `GET /api/health`: liveness plus the live connection count.
async fn health(State(state): State<AppState>) -> Json<Value> {
    let connections = state.registry.connection_count().await;
    Json(json!({ "status": "OK", "connections": connections }))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) type ApiError = (StatusCode, Json<Value>);
pub(crate) type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

/// JSON error body used by the REST handlers.
pub(crate) fn error_body(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "message": message })))
}

/// Store failures answer 500; nothing is emitted for a failed write.
pub(crate) fn store_error(err: StoreError) -> ApiError {
    error!(error = %err, code = err.error_code(), "document store failure");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
}

pub(crate) fn doc_str<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
