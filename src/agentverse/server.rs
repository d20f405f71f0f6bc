//! Inbound HTTP surface.
//!
//! * `POST /task` runs a task. With `"stream": true` the reply is a `text/event-stream` of
//!   [`ProgressEvent`]s ending in `complete` or `error`; otherwise it is the JSON
//!   [`RunReport`](crate::model::RunReport) once the run ends.
//! * `GET /health` answers `{"status": "ok"}`.
//!
//! CORS is permissive so browser dashboards on other origins can subscribe to the stream;
//! the CORS layer answers `OPTIONS` preflights itself.
//! Closing a streaming connection cancels the run.

use crate::agentverse::event::ProgressEvent;
use crate::agentverse::model::{Task, MAX_ITERATIONS_CAP};
use crate::agentverse::orchestrator::Orchestrator;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Body of `POST /task`.
#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub max_iterations: Option<i64>,
    #[serde(default)]
    pub score_threshold: Option<i64>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub scenario: Option<String>,
}

impl TaskRequest {
    /// Validate the request into a [`Task`], or explain what is wrong with it.
    pub fn into_task(self, default_max_iterations: usize) -> Result<Task, String> {
        let description = match self.task {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err("Missing 'task' field".to_string()),
        };

        let max_iterations = match self.max_iterations {
            None => default_max_iterations,
            Some(n) if n >= 1 && n <= MAX_ITERATIONS_CAP as i64 => n as usize,
            Some(n) => {
                return Err(format!(
                    "max_iterations must be between 1 and {}, got {}",
                    MAX_ITERATIONS_CAP, n
                ))
            }
        };

        let mut task = Task::new(description).with_max_iterations(max_iterations);
        match self.score_threshold {
            None => {}
            Some(t) if (0..=100).contains(&t) => task = task.with_score_threshold(t as u8),
            Some(t) => return Err(format!("score_threshold must be between 0 and 100, got {}", t)),
        }
        if let Some(scenario) = self.scenario.filter(|s| !s.trim().is_empty()) {
            task = task.with_scenario(scenario);
        }
        Ok(task)
    }
}

/// The application router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/task", post(submit_task))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(AppState { orchestrator })
}

/// Serve `router(orchestrator)` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, orchestrator: Arc<Orchestrator>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("agentverse::server: listening on {}", addr);
    }
    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown)
        .await
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn submit_task(State(state): State<AppState>, body: Result<Json<TaskRequest>, JsonRejection>) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return json_error(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let stream = request.stream;
    let task = match request.into_task(state.orchestrator.config().default_max_iterations) {
        Ok(task) => task,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, message),
    };

    if stream {
        stream_run(state.orchestrator, task).into_response()
    } else {
        Json(state.orchestrator.run(task).await).into_response()
    }
}

fn stream_run(
    orchestrator: Arc<Orchestrator>,
    task: Task,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(orchestrator.config().progress_queue_capacity);
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();

    tokio::spawn(async move {
        orchestrator.run_with(task, run_cancel, Some(tx)).await;
    });

    // Dropped with the response stream, i.e. when the client goes away.
    let guard = cancel.drop_guard();
    let events = ReceiverStream::new(rx).map(move |event| {
        let _ = &guard;
        Ok(to_sse(&event))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse(event: &ProgressEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|err| {
            warn!("agentverse::server: could not encode {} event: {}", event.name(), err);
            Event::default()
                .event(event.name())
                .data(json!({ "error": err.to_string() }).to_string())
        })
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "Not found")
}
