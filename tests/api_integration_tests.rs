//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chat_gateway::{
    api::create_router,
    inference::{InferenceEngine, Role},
    memory::FixedMemorySource,
    AppState, Config, InferenceError, ServingFacade,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

/// Answers with the question it finds at the end of the prompt. Questions
/// containing "boom" fail.
struct EchoEngine;

impl InferenceEngine for EchoEngine {
    fn generate(&self, prompt: &str, role: Role) -> Result<String, InferenceError> {
        let question = prompt
            .rsplit("User: ")
            .next()
            .unwrap_or_default()
            .trim_end_matches("\n\nAssistant:");
        if question.contains("boom") {
            return Err(InferenceError::Upstream("model crashed".into()));
        }
        Ok(format!("<think>pondering</think>Assistant: [{}] {}", role, question))
    }
}

fn create_test_app_with_memory(memory: Arc<FixedMemorySource>) -> Router {
    let facade = ServingFacade::from_config(&Config::default(), Arc::new(EchoEngine), memory, None);
    create_router(AppState::new(Arc::new(facade)))
}

fn create_test_app() -> Router {
    create_test_app_with_memory(Arc::new(FixedMemorySource::new(30.0)))
}

fn chat_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == Chat Endpoint Tests ==

#[tokio::test]
async fn test_chat_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(chat_request("/api/chat", r#"{"question":"What is DNA?"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["answer"], "[student] What is DNA?");
    assert_eq!(json["degraded"], false);
    assert_eq!(json["outcome"], "answered");
    assert!(json["requestId"].as_str().is_some());
    assert!(json["latencyMs"].as_u64().is_some());
}

#[tokio::test]
async fn test_chat_endpoint_teacher_role() {
    let app = create_test_app();

    let response = app
        .oneshot(chat_request(
            "/api/chat",
            r#"{"question":"Plan a lesson","role":"teacher"}"#,
        ))
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["answer"], "[teacher] Plan a lesson");
}

#[tokio::test]
async fn test_query_alias_matches_chat() {
    let app = create_test_app();

    let response = app
        .oneshot(chat_request("/api/query", r#"{"question":"ping"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["answer"], "[student] ping");
}

#[tokio::test]
async fn test_chat_session_history_is_kept() {
    let app = create_test_app();

    for question in ["first", "second"] {
        let body = format!(r#"{{"question":"{}","sessionId":"abc"}}"#, question);
        let response = app
            .clone()
            .oneshot(chat_request("/api/chat", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get_request("/api/stats")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["conversations"]["active_sessions"], 1);
    assert_eq!(json["conversations"]["total_messages"], 4);
}

#[tokio::test]
async fn test_upstream_failure_is_degraded_not_error() {
    let app = create_test_app();

    let response = app
        .oneshot(chat_request(
            "/api/chat",
            r#"{"question":"boom","sessionId":"s"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["degraded"], true);
    assert_eq!(json["outcome"], "upstream_failed");
}

#[tokio::test]
async fn test_overloaded_is_degraded_not_error() {
    let app = create_test_app_with_memory(Arc::new(FixedMemorySource::new(92.0)));

    let response = app
        .oneshot(chat_request("/api/chat", r#"{"question":"hello"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["degraded"], true);
    assert_eq!(json["outcome"], "overloaded");
    assert!(json["memoryPercent"].as_f64().unwrap() > 85.0);
}

// == Validation Tests ==

#[tokio::test]
async fn test_empty_question_request() {
    let app = create_test_app();

    let response = app
        .oneshot(chat_request("/api/chat", r#"{"question":"   "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("No question provided"));
}

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(chat_request("/api/chat", "not json"))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == Health and Stats Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(get_request("/api/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
    assert_eq!(json["memory"]["level"], "normal");
}

#[tokio::test]
async fn test_health_degraded_under_pressure() {
    let memory = Arc::new(FixedMemorySource::new(30.0));
    let app = create_test_app_with_memory(memory.clone());

    memory.set_percent(88.0);
    let response = app.oneshot(get_request("/api/health")).await.unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["memory"]["level"], "critical");
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    app.clone()
        .oneshot(chat_request("/api/chat", r#"{"question":"count me"}"#))
        .await
        .unwrap();

    let response = app.oneshot(get_request("/api/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["scheduler"]["completed"], 1);
    assert_eq!(json["scheduler"]["batches_processed"], 1);
    assert!(json["cache"].get("hit_rate").is_some());
    assert!(json["memory"].get("current_percent").is_some());
}
