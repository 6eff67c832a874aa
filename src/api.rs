//! HTTP boundary: REST and SSE endpoints over the civic pipeline.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::pipeline::CivicPipeline;
use crate::pipeline::types::{ChatRequest, ChatResponse};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: CivicPipeline,
}

/// Build the router with chat and health routes.
pub fn router(pipeline: CivicPipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .with_state(AppState { pipeline })
        .layer(cors)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "civic-assist",
        "timestamp": chrono::Utc::now(),
        "collaborators": state.pipeline.collaborators(),
    }))
}

// ── Chat ────────────────────────────────────────────────────────────────

/// Sanitize again before anything leaves the process.
fn finalize(pipeline: &CivicPipeline, mut response: ChatResponse) -> ChatResponse {
    response.resources = pipeline.sanitizer().sanitize(response.resources);
    response
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> impl IntoResponse {
    let blank = body.message.trim().is_empty();
    info!(chars = body.message.len(), "Chat request");

    let response = state.pipeline.handle(body).await;
    let response = finalize(&state.pipeline, response);

    let status = if blank {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    (status, Json(response))
}

async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    let (event_tx, event_rx) = mpsc::channel::<Result<Event, Infallible>>(64);
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<String>();

    let progress_events = event_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(line) = progress_rx.recv().await {
            let event = Event::default().event("progress").data(line);
            if progress_events.send(Ok(event)).await.is_err() {
                debug!("Stream client disconnected");
                break;
            }
        }
    });

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        let response = pipeline.handle_streaming(body, progress_tx).await;
        // The progress sender is gone once the run ends, so the forwarder drains and exits.
        let _ = forwarder.await;

        let response = finalize(&pipeline, response);
        let data = serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string());
        let _ = event_tx
            .send(Ok(Event::default().event("result").data(data)))
            .await;
    });

    Sse::new(ReceiverStream::new(event_rx)).keep_alive(KeepAlive::default())
}
