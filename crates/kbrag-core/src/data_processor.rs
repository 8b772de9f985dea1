use std::path::Path;
use tracing::info;

use crate::chunker::ChunkingConfig;
use crate::error::Result;
use crate::loader;
use crate::types::{Chunk, Document, LoadReport};

/// Loaded corpus turned into chunks, with the loader's report kept for the caller.
#[derive(Debug, Default)]
pub struct ProcessedCorpus {
    pub chunks: Vec<Chunk>,
    pub report: LoadReport,
}

#[derive(Debug, Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new(chunking_config: ChunkingConfig) -> Result<Self> {
        chunking_config.validate()?;
        Ok(Self { chunking_config })
    }

    pub fn chunking_config(&self) -> ChunkingConfig {
        self.chunking_config
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<ProcessedCorpus> {
        let report = loader::load_documents(data_dir)?;
        let mut chunks = Vec::new();
        for doc in &report.documents {
            chunks.extend(self.chunk_document(doc)?);
        }
        info!(documents = report.documents.len(), chunks = chunks.len(), "corpus chunked");
        Ok(ProcessedCorpus { chunks, report })
    }

    pub fn chunk_document(&self, doc: &Document) -> Result<Vec<Chunk>> {
        let doc_key = doc_key(&doc.source_path);
        let pieces = self.chunking_config.split(&doc.text)?;
        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| Chunk {
                id: format!("{}:{}", doc_key, chunk_index),
                text,
                source_path: doc.source_path.clone(),
                page: doc.page,
                chunk_index,
            })
            .collect())
    }
}

fn doc_key(source_path: &str) -> String {
    let hash = blake3::hash(source_path.as_bytes()).to_hex().to_string();
    hash[..16].to_string()
}
