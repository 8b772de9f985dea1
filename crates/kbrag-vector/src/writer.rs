use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::Schema;
use lancedb::Connection;
use std::sync::Arc;
use tracing::debug;

use kbrag_core::types::Chunk;
use kbrag_core::{Error, Result};

use crate::schema::{build_chunks_schema, CHUNKS_TABLE};
use crate::table::table_exists;

/// Rows per LanceDB write.
const WRITE_BATCH_ROWS: usize = 1000;

/// Appends embedded chunks to the `chunks` table, creating it on first write.
pub struct LanceDbIndexer {
    db: Connection,
    dim: usize,
    schema: Arc<Schema>,
}

impl LanceDbIndexer {
    pub fn new(db: Connection, dim: usize) -> Result<Self> {
        let schema = build_chunks_schema(dim)?;
        Ok(Self { db, dim, schema })
    }

    /// Write `chunks` with their `embeddings` (same order, same length). Returns rows written.
    pub async fn index(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(Error::Operation(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let mut written = 0usize;
        for (chunk_batch, vector_batch) in chunks.chunks(WRITE_BATCH_ROWS).zip(embeddings.chunks(WRITE_BATCH_ROWS)) {
            self.insert_batch(chunk_batch, vector_batch).await?;
            written += chunk_batch.len();
            debug!(written, total = chunks.len(), "wrote chunk batch");
        }
        Ok(written)
    }

    async fn insert_batch(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let record_batch = self.to_record_batch(chunks, embeddings)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), self.schema.clone()));
        if table_exists(&self.db, CHUNKS_TABLE).await? {
            self.db
                .open_table(CHUNKS_TABLE)
                .execute()
                .await
                .map_err(Error::operation)?
                .add(reader)
                .execute()
                .await
                .map_err(Error::operation)?;
        } else {
            self.db.create_table(CHUNKS_TABLE, reader).execute().await.map_err(Error::operation)?;
        }
        Ok(())
    }

    fn to_record_batch(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
        let mut ids = Vec::with_capacity(chunks.len());
        let mut texts = Vec::with_capacity(chunks.len());
        let mut sources = Vec::with_capacity(chunks.len());
        let mut pages: Vec<Option<i32>> = Vec::with_capacity(chunks.len());
        let mut chunk_indices = Vec::with_capacity(chunks.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(embeddings) {
            if vector.len() != self.dim {
                return Err(Error::Embedding(format!(
                    "chunk {} has a {}-dimensional vector, index expects {}",
                    chunk.id,
                    vector.len(),
                    self.dim
                )));
            }
            ids.push(chunk.id.as_str());
            texts.push(chunk.text.as_str());
            sources.push(chunk.source_path.as_str());
            pages.push(chunk.page.and_then(|p| i32::try_from(p).ok()));
            chunk_indices.push(i32::try_from(chunk.chunk_index).map_err(Error::operation)?);
            vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
        }
        let dim = i32::try_from(self.dim).map_err(Error::operation)?;
        RecordBatch::try_new(
            self.schema.clone(),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(pages)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
            ],
        )
        .map_err(Error::operation)
    }
}
