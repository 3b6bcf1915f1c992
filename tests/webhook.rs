//! Webhook and health endpoint integration tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use whisper_relay::api::ApiServer;
use whisper_relay::processor::UpdateProcessor;
use whisper_relay::telegram::types::Update;

mod common;
use common::setup_test_db;

/// Processor that records dispatched update IDs instead of talking to
/// Telegram
struct RecordingProcessor {
    tx: mpsc::UnboundedSender<i64>,
}

#[async_trait]
impl UpdateProcessor for RecordingProcessor {
    async fn process(&self, update: Update) {
        let _ = self.tx.send(update.update_id);
    }
}

/// Build a test router plus a receiver of processed update IDs
fn build_test_router() -> (axum::Router, mpsc::UnboundedReceiver<i64>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let server = ApiServer::new(setup_test_db(), Arc::new(RecordingProcessor { tx }), 0);
    (server.router(), rx)
}

#[tokio::test]
async fn liveness_endpoint_returns_static_body() {
    let (app, _rx) = build_test_router();

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"whisper-relay alive");
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, _rx) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn readiness_endpoint_checks_database() {
    let (app, _rx) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["checks"]["database"]["status"], "ok");
}

#[tokio::test]
async fn valid_update_is_acked_and_dispatched() {
    let (app, mut rx) = build_test_router();

    let payload = r#"{
        "update_id": 42,
        "message": {
            "message_id": 1,
            "from": {"id": 7, "first_name": "Ada"},
            "chat": {"id": 7, "type": "private"},
            "text": "hello"
        }
    }"#;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ok"], true);

    // The update reaches the processor on its background task
    let dispatched = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("processor should receive the update")
        .unwrap();
    assert_eq!(dispatched, 42);
}

#[tokio::test]
async fn malformed_payload_is_rejected_without_dispatch() {
    let (app, mut rx) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ok"], false);

    // No background task starts for a rejected payload
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn webhook_rejects_get_requests() {
    let (app, _rx) = build_test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/webhook")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
