//! LanceDB connection helpers and the key/value `meta` table describing a built index.

use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use kbrag_core::{Error, Result};

use crate::schema::{build_meta_schema, META_TABLE};

pub async fn open_db(path: &Path) -> Result<Connection> {
    connect(path.to_string_lossy().as_ref()).execute().await.map_err(Error::operation)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(Error::operation)?;
    Ok(names.iter().any(|n| n == name))
}

/// What an index was built with; checked against the running configuration on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    /// RFC 3339 build time.
    pub built_at: String,
}

impl IndexMeta {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("embedder_id", self.embedder_id.clone()),
            ("dim", self.dim.to_string()),
            ("chunk_count", self.chunk_count.to_string()),
            ("document_count", self.document_count.to_string()),
            ("built_at", self.built_at.clone()),
        ]
    }

    fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            map.get(key)
                .cloned()
                .ok_or_else(|| Error::IndexLoad(format!("index metadata is missing '{key}'")))
        };
        let number = |key: &str| -> Result<usize> {
            get(key)?
                .parse()
                .map_err(|e| Error::IndexLoad(format!("index metadata '{key}' is not a number: {e}")))
        };
        Ok(Self {
            embedder_id: get("embedder_id")?,
            dim: number("dim")?,
            chunk_count: number("chunk_count")?,
            document_count: number("document_count")?,
            built_at: get("built_at")?,
        })
    }
}

pub async fn write_meta(conn: &Connection, meta: &IndexMeta) -> Result<()> {
    let pairs = meta.to_pairs();
    let now = Utc::now().timestamp_millis();
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(pairs.iter().map(|(k, _)| *k).collect::<Vec<_>>())),
            Arc::new(StringArray::from(pairs.iter().map(|(_, v)| v.as_str()).collect::<Vec<_>>())),
            Arc::new(TimestampMillisecondArray::from(vec![now; pairs.len()])),
        ],
    )
    .map_err(Error::operation)?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    conn.create_table(META_TABLE, reader).execute().await.map_err(Error::operation)?;
    Ok(())
}

pub async fn read_meta(conn: &Connection) -> Result<IndexMeta> {
    if !table_exists(conn, META_TABLE).await? {
        return Err(Error::IndexLoad(format!("index has no '{META_TABLE}' table")));
    }
    let load_err = |e: lancedb::Error| Error::IndexLoad(e.to_string());
    let t = conn.open_table(META_TABLE).execute().await.map_err(load_err)?;
    let mut stream = t.query().execute().await.map_err(load_err)?;
    let mut map = HashMap::new();
    while let Some(batch) = stream.try_next().await.map_err(load_err)? {
        let (keys, values) = (typed_column::<StringArray>(&batch, "key")?, typed_column::<StringArray>(&batch, "value")?);
        for i in 0..batch.num_rows() {
            map.insert(keys.value(i).to_string(), values.value(i).to_string());
        }
    }
    IndexMeta::from_map(&map)
}

pub(crate) fn typed_column<'a, A: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<A>())
        .ok_or_else(|| Error::IndexLoad(format!("column '{name}' is missing or has an unexpected type")))
}
