//! Wire types for `POST /api/v1/chat` and their validation.

use serde::{Deserialize, Serialize};

use kbrag_core::config::RetrievalSettings;
use kbrag_core::{Error, Result};

use crate::mode::Mode;
use crate::shaper::Match;

/// Request body as received. Missing fields take their defaults in [`ChatPayload::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatPayload {
    pub query: Option<String>,
    pub k: Option<i64>,
    pub mode: Option<String>,
}

impl ChatPayload {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: Some(query.into()), ..Self::default() }
    }

    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::InvalidRequest(format!("malformed request body: {e}")))
    }

    pub fn validate(&self, retrieval: &RetrievalSettings) -> Result<ChatRequest> {
        let query = match self.query.as_deref() {
            Some(q) if !q.trim().is_empty() => q.to_string(),
            Some(_) => return Err(Error::InvalidRequest("query must not be blank".into())),
            None => return Err(Error::InvalidRequest("query is required".into())),
        };
        let k = match self.k {
            None => retrieval.default_k,
            Some(k) => usize::try_from(k)
                .ok()
                .filter(|k| (1..=retrieval.max_k).contains(k))
                .ok_or_else(|| Error::InvalidRequest(format!("k must be between 1 and {}, got {k}", retrieval.max_k)))?,
        };
        let mode = match self.mode.as_deref() {
            None => Mode::default(),
            Some(m) => m.parse()?,
        };
        Ok(ChatRequest { query, k, mode })
    }
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub query: String,
    pub k: usize,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub mode: Mode,
    pub model: String,
    pub answer: String,
    pub matches: Vec<Match>,
}
