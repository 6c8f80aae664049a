//! Task routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::frame::now_ms;
use crate::routes::auth::AuthUser;
use crate::routes::{ApiResult, doc_str, error_body, store_error};
use crate::services::bridge::Mutation;
use crate::services::store::Collection;
use crate::state::AppState;

/// Fields a `PUT /api/tasks/:id` body may change. Anything else is ignored.
const UPDATABLE_FIELDS: [&str; 7] = ["title", "description", "assignedTo", "status", "priority", "dueDate", "tags"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub due_date: Option<Value>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub content: Option<String>,
}

/// `POST /api/projects/:project_id/tasks`: create a task.
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(project_id): Path<String>,
    Json(body): Json<CreateTaskBody>,
) -> ApiResult {
    let title = body.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Task title is required"));
    }

    let doc = json!({
        "title": title,
        "description": body.description.as_deref().map(str::trim).unwrap_or_default(),
        "projectId": project_id,
        "assignedTo": body.assigned_to,
        "assignedBy": identity.uid,
        "status": "todo",
        "priority": body.priority.unwrap_or_else(|| "medium".into()),
        "dueDate": body.due_date.unwrap_or(Value::Null),
        "tags": body.tags.unwrap_or_default(),
        "comments": [],
        "completedAt": null,
        "createdAt": now_ms(),
    });
    let task = state
        .store
        .insert(Collection::Tasks, doc)
        .await
        .map_err(store_error)?;

    state.bridge.emit(Mutation::TaskCreated(task.clone())).await;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /api/tasks/:id`: apply the updatable fields present in the body.
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(task_id): Path<String>,
    Json(updates): Json<Map<String, Value>>,
) -> ApiResult {
    let blank_title = updates
        .get("title")
        .is_some_and(|t| t.as_str().is_none_or(|t| t.trim().is_empty()));
    if blank_title {
        return Err(error_body(StatusCode::BAD_REQUEST, "Task title is required"));
    }

    let mut task = find_task(&state, &task_id).await?;
    apply_updates(&mut task, &updates, now_ms());

    let task = state
        .store
        .replace(Collection::Tasks, &task_id, task)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Task not found"))?;

    state.bridge.emit(Mutation::TaskUpdated(task.clone())).await;
    Ok((StatusCode::OK, Json(task)))
}

/// `DELETE /api/tasks/:id`
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult {
    let removed = state
        .store
        .delete(Collection::Tasks, &task_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Task not found"))?;

    match doc_str(&removed, "projectId") {
        Some(project_id) => {
            state
                .bridge
                .emit(Mutation::TaskDeleted { project_id: project_id.to_owned(), task_id })
                .await;
        }
        None => tracing::warn!(%task_id, "deleted task had no projectId; no event emitted"),
    }
    Ok((StatusCode::OK, Json(json!({ "message": "Task deleted successfully" }))))
}

/// `POST /api/tasks/:id/comments`: append a comment by the caller.
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(task_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> ApiResult {
    let content = body.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Comment content is required"));
    }

    let mut task = find_task(&state, &task_id).await?;
    let comment = json!({
        "userId": identity.uid,
        "userName": identity.name,
        "content": content,
        "createdAt": now_ms(),
    });
    match task.get_mut("comments").and_then(Value::as_array_mut) {
        Some(comments) => comments.push(comment.clone()),
        None => task["comments"] = json!([comment.clone()]),
    }

    let task = state
        .store
        .replace(Collection::Tasks, &task_id, task)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Task not found"))?;

    if let Some(project_id) = doc_str(&task, "projectId") {
        state
            .bridge
            .emit(Mutation::TaskCommentAdded {
                project_id: project_id.to_owned(),
                task_id,
                comment: comment.clone(),
            })
            .await;
    }
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn find_task(state: &AppState, task_id: &str) -> Result<Value, crate::routes::ApiError> {
    state
        .store
        .find(Collection::Tasks, task_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "Task not found"))
}

/// Copy the updatable fields into `task` and keep `completedAt` in step
/// with `status`.
fn apply_updates(task: &mut Value, updates: &Map<String, Value>, now: i64) {
    let Some(doc) = task.as_object_mut() else {
        return;
    };
    for field in UPDATABLE_FIELDS {
        if let Some(value) = updates.get(field) {
            doc.insert(field.to_owned(), value.clone());
        }
    }

    let Some(status) = updates.get("status").and_then(Value::as_str) else {
        return;
    };
    if status != "done" {
        doc.insert("completedAt".into(), Value::Null);
    } else if doc.get("completedAt").is_none_or(Value::is_null) {
        doc.insert("completedAt".into(), json!(now));
    }
}

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tests;
