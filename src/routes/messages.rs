//! Chat message routes. Each successful write is handed to the bridge.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::frame::now_ms;
use crate::routes::auth::AuthUser;
use crate::routes::{ApiError, ApiResult, doc_str, error_body, store_error};
use crate::services::bridge::Mutation;
use crate::services::store::Collection;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageBody {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    pub reply_to: Option<String>,
    pub mentions: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct EditMessageBody {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ReactionBody {
    pub emoji: Option<String>,
}

/// `POST /api/projects/:project_id/messages`: send a chat message.
pub async fn create_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(project_id): Path<String>,
    Json(body): Json<CreateMessageBody>,
) -> ApiResult {
    let content = body.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Message content is required"));
    }

    let doc = json!({
        "projectId": project_id,
        "userId": identity.uid,
        "userName": identity.name,
        "content": content,
        "type": body.message_type.unwrap_or_else(|| "text".into()),
        "replyTo": body.reply_to,
        "mentions": body.mentions.unwrap_or_default(),
        "reactions": [],
        "edited": { "isEdited": false, "editedAt": null, "originalContent": null },
        "createdAt": now_ms(),
    });
    let message = state
        .store
        .insert(Collection::Messages, doc)
        .await
        .map_err(store_error)?;

    state
        .bridge
        .emit(Mutation::MessageCreated(message.clone()))
        .await;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `PUT /api/messages/:id`: edit one of the caller's own messages.
pub async fn edit_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(message_id): Path<String>,
    Json(body): Json<EditMessageBody>,
) -> ApiResult {
    let content = body.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Message content is required"));
    }

    let mut message = find_own_message(&state, &message_id, &identity.uid).await?;
    let already_edited = message
        .pointer("/edited/isEdited")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let original = message.get("content").cloned().unwrap_or(Value::Null);
    let previous_original = message
        .pointer("/edited/originalContent")
        .cloned()
        .unwrap_or(Value::Null);

    message["content"] = json!(content);
    message["edited"] = json!({
        "isEdited": true,
        "editedAt": now_ms(),
        "originalContent": if already_edited { previous_original } else { original },
    });

    let message = state
        .store
        .replace(Collection::Messages, &message_id, message)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Message not found"))?;

    state
        .bridge
        .emit(Mutation::MessageEdited(message.clone()))
        .await;
    Ok((StatusCode::OK, Json(message)))
}

/// `DELETE /api/messages/:id`: delete one of the caller's own messages.
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(message_id): Path<String>,
) -> ApiResult {
    let message = find_own_message(&state, &message_id, &identity.uid).await?;
    let project_id = doc_str(&message, "projectId").unwrap_or_default().to_owned();

    let removed = state
        .store
        .delete(Collection::Messages, &message_id)
        .await
        .map_err(store_error)?;
    if removed.is_none() {
        return Err(error_body(StatusCode::NOT_FOUND, "Message not found"));
    }

    if project_id.is_empty() {
        tracing::warn!(%message_id, "deleted message had no projectId; no event emitted");
    } else {
        state
            .bridge
            .emit(Mutation::MessageDeleted { project_id, message_id })
            .await;
    }
    Ok((StatusCode::OK, Json(json!({ "message": "Message deleted successfully" }))))
}

/// `POST /api/messages/:id/reactions`: toggle the caller's reaction.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(message_id): Path<String>,
    Json(body): Json<ReactionBody>,
) -> ApiResult {
    let emoji = body.emoji.as_deref().map(str::trim).unwrap_or_default();
    if emoji.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Emoji is required"));
    }

    let mut message = state
        .store
        .find(Collection::Messages, &message_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Message not found"))?;

    let reactions = toggle(message.get("reactions"), &identity.uid, emoji);
    message["reactions"] = Value::Array(reactions);

    let message = state
        .store
        .replace(Collection::Messages, &message_id, message)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Message not found"))?;

    let reactions = message.get("reactions").cloned().unwrap_or_else(|| json!([]));
    match doc_str(&message, "projectId") {
        Some(project_id) => {
            state
                .bridge
                .emit(Mutation::ReactionUpdated {
                    project_id: project_id.to_owned(),
                    message_id,
                    reactions: reactions.clone(),
                })
                .await;
        }
        None => tracing::warn!(%message_id, "reacted message had no projectId; no event emitted"),
    }
    Ok((StatusCode::OK, Json(json!({ "reactions": reactions }))))
}

async fn find_own_message(state: &AppState, message_id: &str, user_id: &str) -> Result<Value, ApiError> {
    let message = state
        .store
        .find(Collection::Messages, message_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Message not found"))?;
    if doc_str(&message, "userId") != Some(user_id) {
        return Err(error_body(StatusCode::FORBIDDEN, "You can only modify your own messages"));
    }
    Ok(message)
}

/// Remove the user's `emoji` reaction if present, otherwise add it.
fn toggle(existing: Option<&Value>, user_id: &str, emoji: &str) -> Vec<Value> {
    let mut reactions = existing
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let before = reactions.len();
    reactions.retain(|r| !(doc_str(r, "userId") == Some(user_id) && doc_str(r, "emoji") == Some(emoji)));
    if reactions.len() == before {
        reactions.push(json!({ "userId": user_id, "emoji": emoji, "createdAt": now_ms() }));
    }
    reactions
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
