use async_trait::async_trait;

use kbrag_core::traits::VectorIndex;
use kbrag_core::types::{Chunk, ScoredChunk};
use kbrag_core::{Error, Result};
use kbrag_embed::cosine_similarity;

/// In-memory exact cosine index. Ties keep insertion order.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, entries: Vec::new() }
    }

    pub fn from_embedded(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        let dim = embeddings.first().map(Vec::len).unwrap_or_default();
        let mut index = Self::new(dim);
        if chunks.len() != embeddings.len() {
            return Err(Error::Operation(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        for (chunk, vector) in chunks.into_iter().zip(embeddings) {
            index.insert(chunk, vector)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::Embedding(format!(
                "chunk {} has a {}-dimensional vector, index expects {}",
                chunk.id,
                vector.len(),
                self.dim
            )));
        }
        self.entries.push((chunk, vector));
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dim {
            return Err(Error::Operation(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.dim
            )));
        }
        let mut hits: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk { chunk: chunk.clone(), score: cosine_similarity(query, vector) })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}
