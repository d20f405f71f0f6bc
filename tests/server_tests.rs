mod common;

use agentverse::server::router;
use agentverse::Orchestrator;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::*;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> Router {
    let llm = Arc::new(
        ScriptedLlm::new()
            .recruit(recruitment_json(&["summarizer"], "horizontal"))
            .evaluate(evaluation_json(95, true, false, "")),
    );
    let workers = Arc::new(ScriptedWorker::agreeable());
    let orchestrator = Orchestrator::new(config(1), llm, workers).expect("valid config");
    router(Arc::new(orchestrator))
}

fn post_task(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/task")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    agentverse::init_logger();
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn missing_task_is_a_bad_request() {
    agentverse::init_logger();
    let response = app()
        .oneshot(post_task(json!({"max_iterations": 2}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing 'task' field");
}

#[tokio::test]
async fn out_of_range_iterations_are_rejected() {
    agentverse::init_logger();
    let response = app()
        .oneshot(post_task(json!({"task": "x", "max_iterations": 9}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await["error"].as_str().unwrap_or_default().to_string();
    assert!(error.contains("max_iterations"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    agentverse::init_logger();
    let response = app().oneshot(post_task("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn unknown_paths_are_json_404s() {
    agentverse::init_logger();
    let response = app()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not found");
}

#[tokio::test]
async fn blocking_request_returns_the_report() {
    agentverse::init_logger();
    let response = app()
        .oneshot(post_task(json!({"task": "Summarize Rust ownership", "max_iterations": 1}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["outcome"]["status"], "completed");
    assert_eq!(report["final_output"], FINAL_TEXT);
    assert_eq!(report["iterations_completed"], 1);
    assert_eq!(report["llm_requests"][0]["seq"], 1);
    assert_eq!(report["llm_requests"][0]["label"], "recruitment");
}

#[tokio::test]
async fn streaming_request_emits_events_until_complete() {
    agentverse::init_logger();
    let response = app()
        .oneshot(post_task(json!({"task": "Summarize Rust ownership", "stream": true}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let text = body_text(response).await;
    let first = text.find("event: iteration_start").expect("iteration_start event");
    let complete = text.find("event: complete").expect("complete event");
    assert!(first < complete);
    assert!(text.contains("event: llm_request"));
    assert!(text.contains("event: execution_result"));
    assert!(!text.contains("event: error"));
}

#[tokio::test]
async fn closing_the_stream_cancels_the_run() {
    agentverse::init_logger();
    let llm = Arc::new(
        ScriptedLlm::new()
            .recruit(recruitment_json(&["executor"], "horizontal"))
            .evaluate(evaluation_json(95, true, false, "")),
    );
    let workers = Arc::new(ScriptedWorker::new(|_, kind, _| match kind {
        WorkerKind::Execution => Step::Hang,
        _ => Step::Reply("[CONSENSUS]".into()),
    }));
    let started = workers.execution_started.clone();
    let abandoned = workers.hang_abandoned.clone();
    let mut cfg = config(1);
    cfg.worker_timeout = Duration::from_secs(60);
    let app = router(Arc::new(Orchestrator::new(cfg, llm, workers).expect("valid config")));

    let response = app
        .oneshot(post_task(json!({"task": "anything", "stream": true}).to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.expect("first chunk").unwrap();
    assert!(String::from_utf8_lossy(&first).contains("event: iteration_start"));

    started.notified().await;
    drop(body);

    tokio::time::timeout(Duration::from_secs(5), abandoned.notified())
        .await
        .expect("the in-flight worker call was abandoned after the client went away");
}

#[tokio::test]
async fn cors_preflight_is_allowed_from_any_origin() {
    agentverse::init_logger();
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/task")
                .header(header::ORIGIN, "http://dashboard.local")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
