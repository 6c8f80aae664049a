use super::test_helpers::call;
use super::*;
use crate::services::store::MemoryStore;
use crate::state::test_helpers::{identity, open_connection, test_app_state};
use axum::http::Method;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, SubscriberExt};

#[tokio::test]
async fn health_reports_live_connections() {
    let state = test_app_state();
    let (_conn, _rx) = open_connection(&state, &identity("u1", "Alice")).await;

    let (status, body) = call(&state, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK", "connections": 1 }));
}

#[tokio::test]
async fn healthz_is_ok() {
    let (status, _) = call(&test_app_state(), Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn mutation_routes_require_a_bearer_token() {
    let state = test_app_state();
    let body = Some(json!({ "content": "hi" }));

    let (status, _) = call(&state, Method::POST, "/api/projects/p1/messages", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&state, Method::POST, "/api/projects/p1/messages", Some("forged"), body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mutation_routes_are_unavailable_without_a_verifier() {
    let state = AppState::new(Arc::new(MemoryStore::new()), None);

    let (status, _) = call(
        &state,
        Method::POST,
        "/api/notifications",
        Some("dev:u1"),
        Some(json!({ "userId": "u1", "title": "t" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn invalid_frontend_url_falls_back_to_any_origin() {
    // Building the layer must not panic on a value that is not a header.
    let _ = cors_layer(Some("bad\norigin"));
    let _ = cors_layer(Some("http://localhost:5173"));
}

#[test]
fn doc_str_reads_string_fields_only() {
    let doc = json!({ "projectId": "p1", "n": 3 });
    assert_eq!(doc_str(&doc, "projectId"), Some("p1"));
    assert_eq!(doc_str(&doc, "n"), None);
    assert_eq!(doc_str(&doc, "missing"), None);
}

// =============================================================================
// REQUEST SPAN
// =============================================================================

type Fields = Arc<Mutex<Vec<(String, String)>>>;

struct SpanFields(Fields);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanFields {
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, _id: &tracing::span::Id, _ctx: Context<'_, S>) {
        attrs.record(&mut FieldVisitor(&self.0));
    }
}

struct FieldVisitor<'a>(&'a Fields);

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .lock()
            .expect("fields lock")
            .push((field.name().to_owned(), format!("{value:?}")));
    }
}

#[test]
fn request_span_records_path_without_query() {
    let fields = Fields::default();
    let subscriber = tracing_subscriber::registry().with(SpanFields(fields.clone()));
    let req = Request::builder()
        .uri("/api/ws?token=dev:u1:Alice")
        .body(axum::body::Body::empty())
        .expect("request");

    tracing::subscriber::with_default(subscriber, || {
        let _span = request_span(&req);
    });

    let fields = fields.lock().expect("fields lock").clone();
    assert!(fields.contains(&("method".to_owned(), "GET".to_owned())));
    assert!(fields.contains(&("path".to_owned(), "/api/ws".to_owned())));
    assert!(fields.iter().all(|(_, value)| !value.contains("token")));
}
