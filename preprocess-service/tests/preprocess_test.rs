//! Router-level tests for `POST /preprocess`.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use preprocess_service::config::PreprocessConfig;
use preprocess_service::{build_router, AppState};
use serde_json::Value;
use tower::util::ServiceExt;

fn app() -> Router {
    build_router(AppState {
        config: PreprocessConfig::ephemeral(),
    })
}

fn post_json(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/preprocess")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn lowercases_text() {
    let response = app()
        .oneshot(post_json(r#"{"text":"HELLO WORLD"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, serde_json::json!({"processed_data": "hello world"}));
}

#[tokio::test]
async fn empty_text_returns_empty() {
    let response = app().oneshot(post_json(r#"{"text":""}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["processed_data"], "");
}

#[tokio::test]
async fn missing_text_is_treated_as_empty() {
    let response = app().oneshot(post_json("{}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["processed_data"], "");
}

#[tokio::test]
async fn non_string_text_is_rejected() {
    let response = app().oneshot(post_json(r#"{"text":42}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn malformed_json_is_bad_request_and_service_recovers() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post_json(r#"{"text": "#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());

    let response = app
        .oneshot(post_json(r#"{"text":"Still Alive"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["processed_data"], "still alive");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = PreprocessConfig::ephemeral();
    config.common.max_body_bytes = 32;
    let app = build_router(AppState { config });

    let payload = format!(r#"{{"text":"{}"}}"#, "A".repeat(256));
    let response = app.oneshot(post_json(payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn response_carries_request_id() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/preprocess")
                .header("content-type", "application/json")
                .header("x-request-id", "req-42")
                .body(Body::from(r#"{"text":"X"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}
