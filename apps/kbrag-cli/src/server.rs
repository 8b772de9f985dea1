//! HTTP shell: `POST /api/v1/chat` and `GET /health`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use kbrag_answer::{ChatResponse, RagService};
use kbrag_core::Error;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RagService>,
    pub request_timeout: Duration,
}

#[derive(Debug)]
pub enum ApiError {
    Service(Error),
    Timeout(Duration),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Service(err)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::IndexLoad(_) | Error::NotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        Error::Embedding(_) | Error::Completion(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            ApiError::Service(err) => (status_for(err), err.kind(), err.to_string()),
            ApiError::Timeout(limit) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!("request took longer than {}s", limit.as_secs_f32()),
            ),
        };
        if status.is_server_error() {
            error!(kind, message = %message, "chat request failed");
        }
        let body = Json(json!({ "error": { "kind": kind, "message": message } }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "index_loaded": state.service.store().is_loaded() }))
}

async fn chat(State(state): State<AppState>, body: String) -> Result<Json<ChatResponse>, ApiError> {
    match tokio::time::timeout(state.request_timeout, state.service.chat_json(&body)).await {
        Ok(result) => Ok(Json(result?)),
        Err(_) => Err(ApiError::Timeout(state.request_timeout)),
    }
}

/// Load the index once up front, then serve until the process is stopped.
/// A failed startup load is logged; each request retries it.
pub async fn serve(service: Arc<RagService>, addr: SocketAddr, request_timeout: Duration) -> anyhow::Result<()> {
    if let Err(e) = service.store().load().await {
        error!(error = %e, "index failed to load at startup; chat requests will fail until it is built");
    }
    let app = router(AppState { service, request_timeout });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
