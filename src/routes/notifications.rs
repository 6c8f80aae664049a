//! Notification route. Notifications are delivered to `user:<userId>`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::frame::now_ms;
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResult, error_body, store_error};
use crate::services::bridge::Mutation;
use crate::services::store::Collection;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationBody {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub data: Option<Value>,
}

/// `POST /api/notifications`: store a notification and push it to the recipient.
pub async fn create_notification(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Json(body): Json<CreateNotificationBody>,
) -> ApiResult {
    let user_id = body.user_id.as_deref().map(str::trim).unwrap_or_default();
    if user_id.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Notification userId is required"));
    }
    let title = body.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Notification title is required"));
    }

    let doc = json!({
        "userId": user_id,
        "projectId": body.project_id,
        "type": body.notification_type,
        "title": title,
        "message": body.message.unwrap_or_default(),
        "data": body.data.unwrap_or_else(|| json!({})),
        "read": false,
        "readAt": null,
        "createdAt": now_ms(),
    });
    let notification = state
        .store
        .insert(Collection::Notifications, doc)
        .await
        .map_err(store_error)?;

    state
        .bridge
        .emit(Mutation::NotificationCreated(notification.clone()))
        .await;
    Ok((StatusCode::CREATED, Json(notification)))
}

#[cfg(test)]
#[path = "notifications_test.rs"]
mod tests;
