//! Embeddings over the OpenAI-compatible `/embeddings` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use kbrag_core::config::EmbeddingSettings;
use kbrag_core::traits::Embedder;
use kbrag_core::{Error, Result};

/// Native output size of known embedding models.
fn known_model_dim(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: Option<usize>,
    id: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Build from settings, reading the API key from `settings.api_key_env`.
    ///
    /// Local endpoints (localhost / 127.0.0.1) get a dummy key when none is set.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let is_local = settings.base_url.contains("localhost") || settings.base_url.contains("127.0.0.1");
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| is_local.then(|| "local".to_string()))
            .ok_or_else(|| {
                Error::InvalidConfig(format!("embedding API key env var '{}' is not set", settings.api_key_env))
            })?;
        Ok(Self::new_with_key(settings, api_key))
    }

    pub fn new_with_key(settings: &EmbeddingSettings, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
            dimensions: settings.dimensions,
            id: format!("openai:{}", settings.model),
        }
    }

    fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
        let mut parsed: EmbeddingResponse =
            serde_json::from_str(body).map_err(|e| Error::Embedding(format!("invalid response JSON: {e}")))?;
        if parsed.data.len() != expected {
            return Err(Error::Embedding(format!(
                "expected {expected} embeddings, service returned {}",
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    match status.as_u16() {
        401 | 403 => Error::Embedding(format!("authentication failed ({status}): {detail}")),
        429 => Error::Embedding(format!("rate limited: {detail}")),
        _ => Error::Embedding(format!("HTTP {status}: {detail}")),
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> Option<usize> {
        self.dimensions.or_else(|| known_model_dim(&self.model))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let mut body = json!({ "model": self.model, "input": texts });
        if let Some(dimensions) = self.dimensions {
            body["dimensions"] = json!(dimensions);
        }
        debug!(url = %url, model = %self.model, inputs = texts.len(), "requesting embeddings");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Embedding(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(map_http_error(status, &text));
        }
        Self::parse_response(&text, texts.len())
    }
}
