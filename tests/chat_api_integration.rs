//! Integration tests for the chat REST + SSE endpoints.
//!
//! Each test spins up an Axum server on a random port and exercises the real
//! HTTP contract with reqwest. Collaborators are stubs; nothing leaves the host.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use civic_assist::api::router;
use civic_assist::config::CivicConfig;
use civic_assist::error::SearchError;
use civic_assist::pipeline::{CivicPipeline, PipelineDeps};
use civic_assist::search::SearchProvider;
use civic_assist::store::{HistoryStore, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Search stub returning a result with a fabricated website.
struct StubSearch;

#[async_trait]
impl SearchProvider for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, _query: &str) -> Result<String, SearchError> {
        Ok("**Peoria Rescue Mission**\n\
            Emergency shelter assistance for men, women and children\n\
            Phone: (309) 555-0100\n\
            Website: https://peoriarescuemission.org\n"
            .to_string())
    }
}

/// Start a server on a random port, return its base URL.
async fn start_server(deps: PipelineDeps) -> String {
    let config = CivicConfig {
        verify_resources: false,
        ..CivicConfig::default()
    };
    let pipeline = CivicPipeline::new(config, deps).unwrap();
    let app = router(pipeline);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn post_chat(base: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/chat"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

// ── Health ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_collaborators() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(PipelineDeps::default()).await;
        let json: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "civic-assist");
        assert_eq!(json["collaborators"]["language_model"], false);
        assert_eq!(json["collaborators"]["search"], false);
    })
    .await
    .expect("test timed out");
}

// ── Chat ────────────────────────────────────────────────────────────

#[tokio::test]
async fn greeting_returns_conversation_contract() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(PipelineDeps::default()).await;
        let (status, json) = post_chat(&base, json!({"message": "hi", "session_id": "web-1"})).await;

        assert_eq!(status, 200);
        assert_eq!(json["success"], true);
        assert_eq!(json["session_id"], "web-1");
        assert_eq!(json["response_source"], "conversation");
        assert_eq!(json["need_category"], "");
        assert_eq!(json["search_performed"], false);
        assert!(json["resources"].as_array().unwrap().is_empty());
        assert!(json.get("error").is_none());
        assert!(json["step_timings"].is_object());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn emergency_housing_falls_back_to_hotline() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(PipelineDeps::default()).await;
        let (_, json) =
            post_chat(&base, json!({"message": "Emergency housing please help"})).await;

        assert_eq!(json["need_category"], "housing");
        assert_eq!(json["urgency_level"], "high");
        assert_eq!(json["response_source"], "fallback");
        let resources = json["resources"].as_array().unwrap();
        assert!(!resources.is_empty());
        assert_eq!(resources[0]["url"], "tel:211");
        assert!(!json["session_id"].as_str().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn denylisted_urls_never_cross_the_boundary() {
    timeout(TEST_TIMEOUT, async {
        let search: Arc<dyn SearchProvider> = Arc::new(StubSearch);
        let base = start_server(PipelineDeps {
            search: Some(search),
            ..PipelineDeps::default()
        })
        .await;
        let (_, json) = post_chat(&base, json!({"message": "I am homeless tonight"})).await;

        assert_eq!(json["search_performed"], true);
        assert_eq!(json["resources"][0]["name"], "Peoria Rescue Mission");
        assert_eq!(json["resources"][0]["url"], "tel:309-555-0100");
        let body = json["resources"].to_string();
        assert!(!body.contains("peoriarescuemission.org"));
        assert!(!json["response"].as_str().unwrap().contains("peoriarescuemission.org"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blank_message_is_bad_request_with_safe_body() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(PipelineDeps::default()).await;
        let (status, json) = post_chat(&base, json!({"message": "  "})).await;

        assert_eq!(status, 400);
        assert_eq!(json["success"], false);
        assert!(json["response"].as_str().unwrap().contains("211"));
        assert!(json["error"].is_string());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn history_persists_across_requests() {
    timeout(TEST_TIMEOUT, async {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let base = start_server(PipelineDeps {
            store: Some(store.clone() as Arc<dyn HistoryStore>),
            ..PipelineDeps::default()
        })
        .await;

        post_chat(&base, json!({"message": "hello", "session_id": "web-2"})).await;
        post_chat(&base, json!({"message": "I need a lawyer", "session_id": "web-2"})).await;

        let turns = store.recent_turns("web-2", 5).await.unwrap();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].content, "I need a lawyer");
    })
    .await
    .expect("test timed out");
}

// ── Streaming ───────────────────────────────────────────────────────

#[tokio::test]
async fn stream_sends_progress_then_result() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(PipelineDeps::default()).await;
        let body = reqwest::Client::new()
            .post(format!("{base}/api/chat/stream"))
            .json(&json!({"message": "I'm hungry", "session_id": "web-3"}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        let progress = body.find("event: progress").expect("no progress event");
        let result = body.find("event: result").expect("no result event");
        assert!(progress < result);

        let data = body[result..]
            .lines()
            .find_map(|l| l.strip_prefix("data: "))
            .unwrap();
        let json: Value = serde_json::from_str(data).unwrap();
        assert_eq!(json["session_id"], "web-3");
        assert_eq!(json["need_category"], "food");
    })
    .await
    .expect("test timed out");
}
