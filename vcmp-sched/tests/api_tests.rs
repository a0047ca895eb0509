//! Integration tests for vcmp-sched API endpoints

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use helpers::{settle, Harness};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot` method
use vcmp_common::config::SchedulerConfig;
use vcmp_sched::api::{build_router, AppContext};

/// Test helper: Create app around a harness scheduler
fn setup_app(h: &Harness) -> axum::Router {
    let ctx = AppContext::new(h.scheduler.clone(), &SchedulerConfig::default());
    build_router(ctx)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn command(text: &str) -> Value {
    json!({
        "text": text,
        "user_id": 100,
        "user_name": "alice",
        "voice_channel": { "id": 10, "name": "General" }
    })
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let h = Harness::new();
    let response = setup_app(&h).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "vcmp-sched");
    assert!(body["version"].is_string());
    assert_eq!(body["rooms"], 0);
}

// =============================================================================
// Command Endpoint
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_command_endpoint_plays_and_queues() {
    let h = Harness::new();
    let app = setup_app(&h);

    let response = app
        .clone()
        .oneshot(post_json("/rooms/1/commands", command("!play A")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["reply"],
        "Searching for **A**...\nNow playing: **A** (Requested by: alice)"
    );

    let response = app
        .clone()
        .oneshot(post_json("/rooms/1/commands", command("!play B")))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert!(body["reply"].as_str().unwrap().ends_with("Position: `1`."));
    settle().await;

    let response = app.clone().oneshot(get("/rooms/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "playing");
    assert_eq!(body["current"]["title"], "A");
    assert_eq!(body["queue_len"], 1);

    let response = app.oneshot(get("/rooms")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["rooms"], json!([1]));
}

#[tokio::test]
async fn test_command_endpoint_rejects_plain_text() {
    let h = Harness::new();
    let response = setup_app(&h)
        .oneshot(post_json("/rooms/1/commands", command("hello")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert!(body["status"].as_str().unwrap().contains("Not a command"));
}

#[tokio::test]
async fn test_command_without_voice_channel() {
    let h = Harness::new();
    let body = json!({ "text": "!join", "user_id": 100, "user_name": "alice" });
    let response = setup_app(&h)
        .oneshot(post_json("/rooms/1/commands", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["reply"],
        "alice, you need to be in a voice channel for me to join."
    );
}

// =============================================================================
// Room Endpoints
// =============================================================================

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let h = Harness::new();
    let response = setup_app(&h).oneshot(get("/rooms/99")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_stream_content_type() {
    let h = Harness::new();
    let response = setup_app(&h).oneshot(get("/events?room_id=1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}
