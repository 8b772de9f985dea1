//! Domain types shared by the loader, the index and the answering pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub type ChunkId = String;

/// Text extracted from one source file.
///
/// Documents only live between loading and chunking; they are never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source_path: String,
    pub page: Option<u32>,
}

/// A segment of a source document that is embedded and retrieved on its own.
///
/// - `id`: `<source hash>:<chunk_index>`, unique within an index
/// - `source_path`: original path of the file the text came from
/// - `page`: page number when the loader knows it
/// - `chunk_index`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source_path: String,
    pub page: Option<u32>,
    pub chunk_index: usize,
}

impl Chunk {
    /// File name of the source, or `"unknown"` when the chunk carries no usable path.
    pub fn file_name(&self) -> String {
        Path::new(&self.source_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// A retrieval hit. `score` is cosine similarity; higher is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of loading a corpus directory: what was read, what failed, what was skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailure>,
    pub skipped: Vec<PathBuf>,
}
