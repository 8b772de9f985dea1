use std::sync::Arc;

use kbrag_core::types::Chunk;
use kbrag_core::Result;
use kbrag_vector::IndexStore;

/// Top-k chunks for a query, scores dropped.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<IndexStore>,
}

impl Retriever {
    pub fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let hits = self.store.search(query, k).await?;
        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}
