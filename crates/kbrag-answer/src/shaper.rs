use serde::{Deserialize, Serialize};
use std::sync::Arc;

use kbrag_core::types::ScoredChunk;
use kbrag_core::Result;
use kbrag_vector::IndexStore;

pub const SNIPPET_CHARS: usize = 500;

/// Page number when known, otherwise the literal `"N/A"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(u32),
    Label(String),
}

impl From<Option<u32>> for PageRef {
    fn from(page: Option<u32>) -> Self {
        match page {
            Some(n) => PageRef::Number(n),
            None => PageRef::Label("N/A".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMeta {
    pub file: String,
    pub page: PageRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub meta: MatchMeta,
    pub score: f32,
    pub snippet: String,
}

impl From<&ScoredChunk> for Match {
    fn from(hit: &ScoredChunk) -> Self {
        Match {
            meta: MatchMeta { file: hit.chunk.file_name(), page: PageRef::from(hit.chunk.page) },
            score: hit.score,
            snippet: hit.chunk.text.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

/// Runs its own similarity search so matches are reported the same way in every mode.
#[derive(Clone)]
pub struct ResultShaper {
    store: Arc<IndexStore>,
}

impl ResultShaper {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    pub async fn matches(&self, query: &str, k: usize) -> Result<Vec<Match>> {
        let hits = self.store.search(query, k).await?;
        Ok(shape(&hits))
    }
}

pub fn shape(hits: &[ScoredChunk]) -> Vec<Match> {
    hits.iter().map(Match::from).collect()
}
