use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::ScoredChunk;

/// Turns text into vectors. Implementations talk to an embedding service or fake one.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-large`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality when it is known without calling the service.
    fn dim(&self) -> Option<usize>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("service returned no vector for the query".to_string()))
    }
}

/// Nearest-neighbour search over a built index. Read-only once constructed.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;
    fn dim(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Up to `k` hits ordered by descending score.
    async fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;
}
