use super::*;
use serde_json::json;

#[test]
fn room_id_display_matches_wire_format() {
    assert_eq!(RoomId::project("p1").to_string(), "project:p1");
    assert_eq!(RoomId::user("u1").to_string(), "user:u1");
}

#[test]
fn room_id_parses_both_kinds() {
    assert_eq!("project:p1".parse::<RoomId>(), Ok(RoomId::project("p1")));
    assert_eq!("user:u1".parse::<RoomId>(), Ok(RoomId::user("u1")));
    // Only the first separator splits; ids may contain ':'.
    assert_eq!("user:a:b".parse::<RoomId>(), Ok(RoomId::user("a:b")));
}

#[test]
fn room_id_rejects_malformed_input() {
    for raw in ["p1", "project:", "team:p1", ""] {
        assert!(raw.parse::<RoomId>().is_err(), "{raw:?} should not parse");
    }
}

#[test]
fn project_rooms_are_flagged() {
    assert!(RoomId::project("p1").is_project());
    assert!(!RoomId::user("u1").is_project());
}

#[test]
fn kind_serializes_kebab_case() {
    let value = serde_json::to_value(EventKind::TaskCommentAdded).expect("serialize");
    assert_eq!(value, json!("task-comment-added"));
    assert_eq!(EventKind::TaskCommentAdded.as_str(), "task-comment-added");
}

#[test]
fn kind_wire_names_follow_client_contract() {
    assert_eq!(EventKind::MessageCreated.wire_name(), "receiveMessage");
    assert_eq!(EventKind::ReactionUpdated.wire_name(), "messageReactionUpdated");
    assert_eq!(EventKind::NotificationCreated.wire_name(), "newNotification");
    assert_eq!(EventKind::PresenceUpdated.wire_name(), "onlineUsersUpdate");
    assert_eq!(EventKind::TypingStopped.wire_name(), "userStoppedTyping");
}

#[test]
fn event_frame_carries_kind_payload_and_emission_time() {
    let payload = json!({"_id": "t1", "projectId": "p1", "title": "X"});
    let event = Event::new(EventKind::TaskCreated, RoomId::project("p1"), payload.clone());
    let frame = Frame::from(&event);

    assert_eq!(frame.syscall, "taskCreated");
    assert_eq!(frame.room.as_deref(), Some("project:p1"));
    assert_eq!(frame.ts, event.emitted_at);
    assert_eq!(frame.data.get("kind"), Some(&json!("task-created")));
    assert_eq!(frame.data.get("payload"), Some(&payload));
}
