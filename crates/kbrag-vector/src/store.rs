//! Process-wide handle on the serving index.
//!
//! The index is opened on first use and kept for the life of the process.
//! Concurrent first callers share a single open; a failed open is not
//! remembered, so the next call tries again.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use kbrag_core::traits::{Embedder, VectorIndex};
use kbrag_core::types::ScoredChunk;
use kbrag_core::{Error, Result};

use crate::search::LanceIndex;

/// Produces the index the store serves from.
#[async_trait]
pub trait IndexOpener: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn VectorIndex>>;
}

/// Opens a LanceDB index directory and checks it was built with the configured embedder.
pub struct LanceOpener {
    index_dir: PathBuf,
    embedder_id: String,
    dim: Option<usize>,
}

impl LanceOpener {
    pub fn new(index_dir: PathBuf, embedder: &dyn Embedder) -> Self {
        Self { index_dir, embedder_id: embedder.embedder_id().to_string(), dim: embedder.dim() }
    }
}

#[async_trait]
impl IndexOpener for LanceOpener {
    async fn open(&self) -> Result<Arc<dyn VectorIndex>> {
        let index = LanceIndex::open(&self.index_dir).await?;
        let meta = index.meta();
        if meta.embedder_id != self.embedder_id {
            return Err(Error::IndexLoad(format!(
                "index was built with '{}' but '{}' is configured; rebuild the index",
                meta.embedder_id, self.embedder_id
            )));
        }
        if let Some(dim) = self.dim {
            if dim != index.dim() {
                return Err(Error::IndexLoad(format!(
                    "index vectors are {}-dimensional but the embedder produces {dim}",
                    index.dim()
                )));
            }
        }
        Ok(Arc::new(index))
    }
}

/// Serves an index that is already in memory.
pub struct PreloadedOpener(pub Arc<dyn VectorIndex>);

#[async_trait]
impl IndexOpener for PreloadedOpener {
    async fn open(&self) -> Result<Arc<dyn VectorIndex>> {
        Ok(Arc::clone(&self.0))
    }
}

pub struct IndexStore {
    opener: Arc<dyn IndexOpener>,
    embedder: Arc<dyn Embedder>,
    cell: OnceCell<Arc<dyn VectorIndex>>,
}

impl IndexStore {
    pub fn new(opener: Arc<dyn IndexOpener>, embedder: Arc<dyn Embedder>) -> Self {
        Self { opener, embedder, cell: OnceCell::new() }
    }

    pub fn lance(index_dir: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        let opener = LanceOpener::new(index_dir, embedder.as_ref());
        Self::new(Arc::new(opener), embedder)
    }

    pub async fn load(&self) -> Result<Arc<dyn VectorIndex>> {
        let index = self
            .cell
            .get_or_try_init(|| async {
                let started = Instant::now();
                let index = self.opener.open().await?;
                info!(chunks = index.len(), dim = index.dim(), elapsed_ms = started.elapsed().as_millis(), "index loaded");
                Ok::<_, Error>(index)
            })
            .await?;
        Ok(Arc::clone(index))
    }

    /// The index if a previous `load` succeeded.
    pub fn loaded(&self) -> Result<Arc<dyn VectorIndex>> {
        self.cell.get().cloned().ok_or(Error::NotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed `query` once and return up to `k` hits, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::InvalidRequest("k must be at least 1".into()));
        }
        let index = self.load().await?;
        let query_vec = self.embedder.embed_query(query).await?;
        let hits = index.search_vec(&query_vec, k).await?;
        debug!(k, hits = hits.len(), top_score = hits.first().map(|h| h.score), "similarity search");
        Ok(hits)
    }
}
