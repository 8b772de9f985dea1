use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;

use kbrag_core::traits::VectorIndex;
use kbrag_core::types::{Chunk, ScoredChunk};
use kbrag_core::{Error, Result};

use crate::schema::{vector_dim, CHUNKS_TABLE};
use crate::table::{open_db, read_meta, table_exists, typed_column, IndexMeta};

/// A persisted index opened read-only. Exact cosine search over the `chunks` table.
pub struct LanceIndex {
    table: Table,
    len: usize,
    dim: usize,
    meta: IndexMeta,
}

impl LanceIndex {
    pub async fn open(index_dir: &Path) -> Result<Self> {
        if !index_dir.is_dir() {
            return Err(Error::IndexLoad(format!("index directory {} does not exist", index_dir.display())));
        }
        let load_err = |e: lancedb::Error| Error::IndexLoad(e.to_string());
        let conn = open_db(index_dir).await.map_err(|e| Error::IndexLoad(e.to_string()))?;
        if !table_exists(&conn, CHUNKS_TABLE).await? {
            return Err(Error::IndexLoad(format!(
                "no '{CHUNKS_TABLE}' table under {}",
                index_dir.display()
            )));
        }
        let meta = read_meta(&conn).await?;
        let table = conn.open_table(CHUNKS_TABLE).execute().await.map_err(load_err)?;
        let schema = table.schema().await.map_err(load_err)?;
        let dim = vector_dim(&schema).ok_or_else(|| Error::IndexLoad("chunks table has no vector column".into()))?;
        let len = table.count_rows(None).await.map_err(load_err)?;
        if dim != meta.dim {
            return Err(Error::IndexLoad(format!(
                "vector column is {dim}-dimensional but metadata says {}",
                meta.dim
            )));
        }
        Ok(Self { table, len, dim, meta })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }
}

fn batch_hits(batch: &RecordBatch, out: &mut Vec<ScoredChunk>) -> Result<()> {
    let ids = typed_column::<StringArray>(batch, "id")?;
    let texts = typed_column::<StringArray>(batch, "text")?;
    let sources = typed_column::<StringArray>(batch, "source_path")?;
    let pages = typed_column::<Int32Array>(batch, "page")?;
    let chunk_indices = typed_column::<Int32Array>(batch, "chunk_index")?;
    let distances = typed_column::<Float32Array>(batch, "_distance")?;
    for i in 0..batch.num_rows() {
        let page = if pages.is_null(i) { None } else { u32::try_from(pages.value(i)).ok() };
        out.push(ScoredChunk {
            chunk: Chunk {
                id: ids.value(i).to_string(),
                text: texts.value(i).to_string(),
                source_path: sources.value(i).to_string(),
                page,
                chunk_index: usize::try_from(chunk_indices.value(i)).unwrap_or_default(),
            },
            score: 1.0 - distances.value(i),
        });
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for LanceIndex {
    fn len(&self) -> usize {
        self.len
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn search_vec(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(Error::Operation(format!(
                "query vector has {} dimensions, index has {}",
                query.len(),
                self.dim
            )));
        }
        let mut stream = self
            .table
            .vector_search(query.to_vec())
            .map_err(Error::operation)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(Error::operation)?;
        let mut hits = Vec::with_capacity(k);
        while let Some(batch) = stream.try_next().await.map_err(Error::operation)? {
            batch_hits(&batch, &mut hits)?;
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}
