//! End-to-end webhook endpoint tests over a real HTTP listener.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use taskbridge::persistence::db;
use taskbridge::router::EventRouter;
use taskbridge::webhook::server::{self, AppState};
use taskbridge::webhook::signature;

use super::test_helpers::{test_config, FakeClassifier, FakeNotifier, FakeResolver, FakeTracker};

const SECRET: &str = "test-signing-secret";

struct TestServer {
    base: String,
    tracker: Arc<FakeTracker>,
    cancel: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

async fn start(classifier: FakeClassifier) -> TestServer {
    let mut config = test_config();
    config.http_port = free_port();
    config.slack.signing_secret = SECRET.to_owned();
    let config = Arc::new(config);

    let database = Arc::new(db::connect_memory().await.unwrap());
    let tracker = Arc::new(FakeTracker::default());
    let router = EventRouter::new(
        Arc::clone(&config),
        database,
        Arc::new(classifier),
        Arc::clone(&tracker) as Arc<dyn taskbridge::tracker::TrackTasks>,
        Arc::new(FakeNotifier::default()),
        Arc::new(FakeResolver::from_entries(&[])),
    );
    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        router,
    });

    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = server::serve(state, server_cancel).await;
    });
    // Give the listener a beat to bind before the first request.
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestServer {
        base: format!("http://127.0.0.1:{}", config.http_port),
        tracker,
        cancel,
    }
}

async fn post_raw(base: &str, body: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/slack/events"))
        .body(body.to_owned())
        .send()
        .await
        .unwrap()
}

async fn post_signed(base: &str, body: &str) -> reqwest::Response {
    let timestamp = Utc::now().timestamp().to_string();
    let sig = signature::sign(SECRET, &timestamp, body.as_bytes()).unwrap();
    reqwest::Client::new()
        .post(format!("{base}/slack/events"))
        .header("x-slack-signature", sig)
        .header("x-slack-request-timestamp", timestamp)
        .body(body.to_owned())
        .send()
        .await
        .unwrap()
}

fn message_body(event_id: &str, text: &str) -> String {
    format!(
        r#"{{"type":"event_callback","event_id":"{event_id}","event":{{"type":"message","text":"{text}","ts":"1726000000.000100","user":"U0AUTHOR","channel":"C0DESIGN"}}}}"#
    )
}

#[tokio::test]
async fn health_endpoint_responds() {
    let server = start(FakeClassifier::not_a_task()).await;

    let response = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn url_verification_echoes_the_challenge_unsigned() {
    let server = start(FakeClassifier::not_a_task()).await;

    let body = r#"{"type":"url_verification","challenge":"ch4ll3ng3"}"#;
    let response = post_raw(&server.base, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ch4ll3ng3");
}

#[tokio::test]
async fn url_verification_without_a_challenge_is_rejected() {
    let server = start(FakeClassifier::not_a_task()).await;

    let response = post_raw(&server.base, r#"{"type":"url_verification"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsigned_event_callback_is_unauthorized() {
    let server = start(FakeClassifier::task("should never run")).await;

    let response = post_raw(&server.base, &message_body("Ev0001", "need a banner")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(server.tracker.creates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn badly_signed_event_callback_is_unauthorized() {
    let server = start(FakeClassifier::task("should never run")).await;

    let body = message_body("Ev0001", "need a banner");
    let timestamp = Utc::now().timestamp().to_string();
    let response = reqwest::Client::new()
        .post(format!("{}/slack/events", server.base))
        .header("x-slack-signature", format!("v0={}", "0".repeat(64)))
        .header("x-slack-request-timestamp", timestamp)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let server = start(FakeClassifier::not_a_task()).await;

    let response = post_raw(&server.base, "this is not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_requests_are_method_not_allowed() {
    let server = start(FakeClassifier::not_a_task()).await;

    let response = reqwest::get(format!("{}/slack/events", server.base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn message_event_with_a_broken_shape_is_a_bad_request() {
    let server = start(FakeClassifier::not_a_task()).await;

    // A message event missing its required ts and channel fields.
    let body = r#"{"type":"event_callback","event_id":"Ev0001","event":{"type":"message","text":"need a banner"}}"#;
    let response = post_signed(&server.base, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_message_events_are_acknowledged() {
    let server = start(FakeClassifier::task("should never run")).await;

    let body = r#"{"type":"event_callback","event_id":"Ev0001","event":{"type":"reaction_added","ts":"1.1","channel":"C0DESIGN"}}"#;
    let response = post_signed(&server.base, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ignored");
}

#[tokio::test]
async fn unknown_envelope_types_are_acknowledged() {
    let server = start(FakeClassifier::not_a_task()).await;

    let response = post_raw(&server.base, r#"{"type":"app_rate_limited"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ignored");
}

#[tokio::test]
async fn signed_non_task_message_is_acknowledged() {
    let server = start(FakeClassifier::not_a_task()).await;

    let response = post_signed(&server.base, &message_body("Ev0001", "lol nice one")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "not a task");
}

#[tokio::test]
async fn signed_task_message_reports_the_created_item() {
    let server = start(FakeClassifier::task("Matchday banner")).await;

    let response = post_signed(&server.base, &message_body("Ev0001", "need a banner")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "task created: item-1");
    assert_eq!(server.tracker.creates.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn tracker_creation_failure_asks_for_a_retry() {
    let server = start(FakeClassifier::task("Matchday banner")).await;
    server.tracker.fail_create.store(true, Ordering::SeqCst);

    let response = post_signed(&server.base, &message_body("Ev0001", "need a banner")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
