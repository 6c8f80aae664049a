use super::*;
use crate::event::RoomId;
use crate::routes::test_helpers::call;
use crate::state::test_helpers::{assert_no_frame, identity, open_connection, recv_frame, test_app_state};
use axum::http::Method;

#[tokio::test]
async fn notification_reaches_recipient_user_room_only() {
    let state = test_app_state();
    let (u1, mut rx_u1) = open_connection(&state, &identity("u1", "Alice")).await;
    let (u2, mut rx_u2) = open_connection(&state, &identity("u2", "Bob")).await;
    state.registry.join(u1, RoomId::user("u1")).await;
    state.registry.join(u2, RoomId::user("u2")).await;
    state.registry.join(u2, RoomId::project("p1")).await;

    let (status, notification) = call(
        &state,
        Method::POST,
        "/api/notifications",
        Some("dev:u2:Bob"),
        Some(json!({ "userId": "u1", "projectId": "p1", "type": "task_assigned", "title": "New task" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(notification["read"], json!(false));
    assert_eq!(notification["data"], json!({}));
    let event = recv_frame(&mut rx_u1).await;
    assert_eq!(event.syscall, "newNotification");
    assert_eq!(event.room.as_deref(), Some("user:u1"));
    assert_eq!(event.data.get("payload"), Some(&notification));
    assert_no_frame(&mut rx_u2).await;
}

#[tokio::test]
async fn notification_requires_recipient_and_title() {
    let state = test_app_state();

    let (status, _) = call(&state, Method::POST, "/api/notifications", Some("dev:u1"), Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&state, Method::POST, "/api/notifications", Some("dev:u1"), Some(json!({ "userId": "u1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
