use super::*;

#[tokio::test]
async fn start_then_stop_clears_entry() {
    let typing = TypingCoordinator::new();
    let room = RoomId::project("p1");

    typing.start(&room, "u1", "Alice").await;
    assert_eq!(
        typing.roster(&room).await,
        vec![TypingState { user_id: "u1".into(), user_name: "Alice".into() }]
    );

    assert!(typing.stop(&room, "u1").await);
    assert!(typing.roster(&room).await.is_empty());
    assert!(!typing.stop(&room, "u1").await);
}

#[tokio::test]
async fn repeated_start_refreshes_single_entry() {
    let typing = TypingCoordinator::new();
    let room = RoomId::project("p1");

    typing.start(&room, "u1", "Alice").await;
    typing.start(&room, "u1", "Alice").await;
    typing.start(&room, "u2", "Bob").await;

    let roster = typing.roster(&room).await;
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].user_id, "u1");
    assert_eq!(roster[1].user_id, "u2");
}

#[tokio::test]
async fn rooms_are_independent() {
    let typing = TypingCoordinator::new();
    typing.start(&RoomId::project("p1"), "u1", "Alice").await;

    assert!(typing.roster(&RoomId::project("p2")).await.is_empty());
    assert!(!typing.stop(&RoomId::project("p2"), "u1").await);
    assert_eq!(typing.roster(&RoomId::project("p1")).await.len(), 1);
}
