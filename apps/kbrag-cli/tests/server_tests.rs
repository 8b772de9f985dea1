use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use kbrag_answer::llm::{ChatModel, Completion, CompletionRequest};
use kbrag_answer::RagService;
use kbrag_cli::server::{router, AppState};
use kbrag_core::config::Settings;
use kbrag_core::types::Chunk;
use kbrag_core::Result;
use kbrag_embed::FakeEmbedder;
use kbrag_vector::{FlatIndex, IndexStore, PreloadedOpener};

struct FixedModel {
    answer: &'static str,
    delay: Duration,
}

#[async_trait]
impl ChatModel for FixedModel {
    fn model_id(&self) -> &str {
        "fixed-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        tokio::time::sleep(self.delay).await;
        Ok(Completion::text(self.answer))
    }
}

fn flat_store() -> Arc<IndexStore> {
    let embedder = FakeEmbedder::new(128);
    let docs = [
        ("/data/raw/pto.txt", "Employees receive 20 days of PTO annually."),
        ("/data/raw/remote.txt", "Remote work is allowed two days per week."),
    ];
    let chunks = docs
        .iter()
        .map(|(src, text)| Chunk {
            id: format!("{src}:0"),
            text: text.to_string(),
            source_path: src.to_string(),
            page: None,
            chunk_index: 0,
        })
        .collect();
    let vectors = docs.iter().map(|(_, text)| embedder.embed_text(text)).collect();
    let index = FlatIndex::from_embedded(chunks, vectors).unwrap();
    Arc::new(IndexStore::new(Arc::new(PreloadedOpener(Arc::new(index))), Arc::new(embedder)))
}

fn app(store: Arc<IndexStore>, delay: Duration, timeout: Duration) -> axum::Router {
    let model = Arc::new(FixedModel { answer: "Employees receive 20 days of PTO annually.", delay });
    let service = Arc::new(RagService::new(store, model, &Settings::default()));
    router(AppState { service, request_timeout: timeout })
}

async fn post_chat(app: axum::Router, body: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app(flat_store(), Duration::ZERO, Duration::from_secs(5)).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["index_loaded"], false);
}

#[tokio::test]
async fn chat_returns_answer_and_matches() {
    let (status, json) = post_chat(
        app(flat_store(), Duration::ZERO, Duration::from_secs(5)),
        r#"{"query": "How many PTO days do employees get?", "k": 2}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["mode"], "chain");
    assert_eq!(json["model"], "fixed-model");
    assert_eq!(json["answer"], "Employees receive 20 days of PTO annually.");
    assert_eq!(json["matches"].as_array().unwrap().len(), 2);
    assert_eq!(json["matches"][0]["meta"]["file"], "pto.txt");
    assert_eq!(json["matches"][0]["meta"]["page"], "N/A");
}

#[tokio::test]
async fn invalid_payload_is_422() {
    let (status, json) = post_chat(
        app(flat_store(), Duration::ZERO, Duration::from_secs(5)),
        r#"{"query": "PTO?", "mode": "react"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["kind"], "invalid_request");

    let (status, _) = post_chat(app(flat_store(), Duration::ZERO, Duration::from_secs(5)), "{not json").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_index_is_503() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = Arc::new(IndexStore::lance(tmp.path().join("missing"), Arc::new(FakeEmbedder::new(128))));
    let (status, json) = post_chat(app(store, Duration::ZERO, Duration::from_secs(5)), r#"{"query": "PTO?"}"#).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["kind"], "index_load");
}

#[tokio::test]
async fn slow_requests_time_out_with_504() {
    let (status, json) = post_chat(
        app(flat_store(), Duration::from_secs(2), Duration::from_millis(50)),
        r#"{"query": "PTO?"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"]["kind"], "timeout");
}

struct DownModel;

#[async_trait]
impl ChatModel for DownModel {
    fn model_id(&self) -> &str {
        "down-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        Err(kbrag_core::Error::Completion("HTTP 500: upstream exploded".to_string()))
    }
}

#[tokio::test]
async fn upstream_failure_is_502() {
    let service = Arc::new(RagService::new(flat_store(), Arc::new(DownModel), &Settings::default()));
    let app = router(AppState { service, request_timeout: Duration::from_secs(5) });
    let (status, json) = post_chat(app, r#"{"query": "PTO?"}"#).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["kind"], "completion_service");
}
