use super::*;
use crate::state::test_helpers::{assert_no_frame, drain, identity, open_connection, recv_frame, test_app_state};
use serde_json::Value;

async fn is_online(state: &AppState, room: &RoomId, user_id: &str) -> bool {
    state
        .presence
        .roster(room)
        .await
        .iter()
        .any(|entry| entry.user_id == user_id)
}

fn roster_ids(frame: &Frame) -> Vec<String> {
    frame
        .data
        .get("payload")
        .and_then(Value::as_array)
        .expect("roster payload is an array")
        .iter()
        .filter_map(|entry| entry.get("userId").and_then(Value::as_str).map(str::to_owned))
        .collect()
}

#[tokio::test]
async fn presence_roster_reflects_online_and_offline_signals() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let bob = identity("b", "Bob");
    let (conn_a, mut rx_a) = open_connection(&state, &alice).await;
    let (conn_b, mut rx_b) = open_connection(&state, &bob).await;
    join_project(&state, conn_a, &alice, "p1").await;
    join_project(&state, conn_b, &bob, "p1").await;

    user_online(&state, conn_a, &alice, None, None).await.unwrap();
    user_online(&state, conn_b, &bob, Some("p1"), None).await.unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    user_offline(&state, conn_a, &alice, None).await.unwrap();

    let frame = recv_frame(&mut rx_b).await;
    assert_eq!(frame.syscall, "onlineUsersUpdate");
    assert_eq!(frame.data.get("kind").and_then(Value::as_str), Some("presence-updated"));
    assert_eq!(roster_ids(&frame), vec!["b"]);
    assert_eq!(roster_ids(&recv_frame(&mut rx_a).await), vec!["b"]);
}

#[tokio::test]
async fn online_broadcast_includes_sender_and_uses_identity_name() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let (conn, mut rx) = open_connection(&state, &alice).await;
    join_project(&state, conn, &alice, "p1").await;

    let roster = user_online(&state, conn, &alice, None, None).await.unwrap();
    assert_eq!(roster[0].user_name, "Alice");

    let frame = recv_frame(&mut rx).await;
    assert_eq!(roster_ids(&frame), vec!["a"]);
}

#[tokio::test]
async fn offline_for_absent_user_publishes_nothing() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let (conn, mut rx) = open_connection(&state, &alice).await;
    join_project(&state, conn, &alice, "p1").await;

    user_offline(&state, conn, &alice, None).await.unwrap();
    assert_no_frame(&mut rx).await;
}

#[tokio::test]
async fn signals_require_membership() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let (conn, _rx) = open_connection(&state, &alice).await;

    assert_eq!(
        user_online(&state, conn, &alice, None, None).await.unwrap_err(),
        ConnectionError::NoProjectRoom
    );

    join_project(&state, conn, &alice, "p1").await;
    assert_eq!(
        start_typing(&state, conn, &alice, Some("p2"), None).await.unwrap_err(),
        ConnectionError::NotMember(RoomId::project("p2"))
    );
}

#[tokio::test]
async fn typing_lifecycle_notifies_others_only() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let bob = identity("b", "Bob");
    let (conn_a, mut rx_a) = open_connection(&state, &alice).await;
    let (conn_b, mut rx_b) = open_connection(&state, &bob).await;
    join_project(&state, conn_a, &alice, "p1").await;
    join_project(&state, conn_b, &bob, "p1").await;
    let room = RoomId::project("p1");

    start_typing(&state, conn_a, &alice, None, None).await.unwrap();
    let started = recv_frame(&mut rx_b).await;
    assert_eq!(started.syscall, "userTyping");
    assert_eq!(started.data.get("payload"), Some(&json!({"userId": "a", "userName": "Alice"})));
    assert_eq!(state.typing.roster(&room).await.len(), 1);

    stop_typing(&state, conn_a, &alice, None).await.unwrap();
    let stopped = recv_frame(&mut rx_b).await;
    assert_eq!(stopped.syscall, "userStoppedTyping");
    assert_eq!(stopped.data.get("payload"), Some(&json!({"userId": "a"})));

    assert!(state.typing.roster(&room).await.is_empty());
    assert_no_frame(&mut rx_a).await;
}

#[tokio::test]
async fn close_clears_presence_and_typing_of_last_connection() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let bob = identity("b", "Bob");
    let (conn_a, _rx_a) = open_connection(&state, &alice).await;
    let (conn_b, mut rx_b) = open_connection(&state, &bob).await;
    let room = join_project(&state, conn_a, &alice, "p1").await;
    join_project(&state, conn_b, &bob, "p1").await;
    user_online(&state, conn_a, &alice, None, None).await.unwrap();
    user_online(&state, conn_b, &bob, None, None).await.unwrap();
    start_typing(&state, conn_a, &alice, None, None).await.unwrap();
    drain(&mut rx_b);

    close(&state, conn_a).await;

    assert!(!state.registry.members_of(&room).await.contains(&conn_a));
    assert!(!is_online(&state, &room, "a").await);
    assert!(state.typing.roster(&room).await.is_empty());

    let presence = recv_frame(&mut rx_b).await;
    assert_eq!(presence.syscall, "onlineUsersUpdate");
    assert_eq!(roster_ids(&presence), vec!["b"]);
    let typing = recv_frame(&mut rx_b).await;
    assert_eq!(typing.syscall, "userStoppedTyping");
}

#[tokio::test]
async fn close_keeps_presence_while_another_tab_remains() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let (tab_1, _rx_1) = open_connection(&state, &alice).await;
    let (tab_2, mut rx_2) = open_connection(&state, &alice).await;
    let room = join_project(&state, tab_1, &alice, "p1").await;
    join_project(&state, tab_2, &alice, "p1").await;
    user_online(&state, tab_1, &alice, None, None).await.unwrap();
    drain(&mut rx_2);

    close(&state, tab_1).await;

    assert!(is_online(&state, &room, "a").await);
    assert_no_frame(&mut rx_2).await;
}

#[tokio::test]
async fn close_is_safe_for_connections_that_never_joined() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let (conn, _rx) = open_connection(&state, &alice).await;

    close(&state, conn).await;
    close(&state, conn).await;
    assert_eq!(state.registry.connection_count().await, 0);
}

#[tokio::test]
async fn switching_projects_reconciles_the_old_room() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let bob = identity("b", "Bob");
    let (conn_a, _rx_a) = open_connection(&state, &alice).await;
    let (conn_b, mut rx_b) = open_connection(&state, &bob).await;
    let old_room = join_project(&state, conn_a, &alice, "p1").await;
    join_project(&state, conn_b, &bob, "p1").await;
    user_online(&state, conn_a, &alice, None, None).await.unwrap();
    drain(&mut rx_b);

    let new_room = join_project(&state, conn_a, &alice, "p2").await;

    assert_eq!(state.registry.project_room_of(conn_a).await, Some(new_room));
    assert!(!state.registry.members_of(&old_room).await.contains(&conn_a));
    assert!(!is_online(&state, &old_room, "a").await);
    let frame = recv_frame(&mut rx_b).await;
    assert!(roster_ids(&frame).is_empty());
}

#[tokio::test]
async fn leave_project_returns_the_room_left() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let (conn, _rx) = open_connection(&state, &alice).await;

    assert_eq!(leave_project(&state, conn, &alice).await, None);
    join_project(&state, conn, &alice, "p1").await;
    assert_eq!(leave_project(&state, conn, &alice).await, Some(RoomId::project("p1")));
    assert_eq!(state.registry.project_room_of(conn).await, None);
}

#[tokio::test]
async fn user_room_join_is_limited_to_own_identity() {
    let state = test_app_state();
    let alice = identity("a", "Alice");
    let (conn, _rx) = open_connection(&state, &alice).await;

    assert_eq!(join_user_room(&state, conn, &alice, "a").await, Ok(RoomId::user("a")));
    assert_eq!(
        join_user_room(&state, conn, &alice, "b").await,
        Err(ConnectionError::ForeignUserRoom("b".into()))
    );
    assert!(state.registry.is_member(conn, &RoomId::user("a")).await);
}
