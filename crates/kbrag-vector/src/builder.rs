//! Offline index build: load, chunk, embed in batches, persist.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use kbrag_core::chunker::ChunkingConfig;
use kbrag_core::config::Settings;
use kbrag_core::data_processor::{DataProcessor, ProcessedCorpus};
use kbrag_core::traits::Embedder;
use kbrag_core::types::{Chunk, LoadFailure};
use kbrag_core::{Error, Result};

use crate::flat::FlatIndex;
use crate::table::{open_db, write_meta, IndexMeta};
use crate::writer::LanceDbIndexer;

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub failures: Vec<LoadFailure>,
    pub skipped: usize,
    pub dimension: usize,
    pub embedder_id: String,
    /// Where the index was written; `None` for in-memory builds.
    pub index_dir: Option<PathBuf>,
}

struct EmbeddedCorpus {
    corpus: ProcessedCorpus,
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
}

pub struct IndexBuilder {
    processor: DataProcessor,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(processor: DataProcessor, embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("embedding batch size must be positive".into()));
        }
        Ok(Self { processor, embedder, batch_size, show_progress: false })
    }

    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let processor = DataProcessor::new(ChunkingConfig::from(&settings.chunking))?;
        Self::new(processor, embedder, settings.embedding.batch_size)
    }

    /// Draw an `indicatif` bar while embedding.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build and persist to `index_dir`, replacing whatever was there.
    ///
    /// The index is written into a staging directory next to `index_dir` and
    /// swapped in only once its `meta` table is written; a failed build leaves
    /// the previous index untouched.
    pub async fn build(&self, corpus_dir: &Path, index_dir: &Path) -> Result<BuildReport> {
        let started = Instant::now();
        let embedded = self.embed_corpus(corpus_dir).await?;

        let parent = match index_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(Error::operation)?;
        let staging = tempfile::Builder::new()
            .prefix(".kbrag-index-")
            .tempdir_in(&parent)
            .map_err(Error::operation)?;

        let written = self.persist(staging.path(), &embedded).await?;
        swap_into_place(staging.path(), index_dir)?;

        info!(
            index_dir = %index_dir.display(),
            chunks = written,
            dim = embedded.dimension,
            elapsed_ms = started.elapsed().as_millis(),
            "index built"
        );
        Ok(self.report(&embedded, Some(index_dir.to_path_buf())))
    }

    async fn persist(&self, dir: &Path, embedded: &EmbeddedCorpus) -> Result<usize> {
        let conn = open_db(dir).await?;
        let indexer = LanceDbIndexer::new(conn.clone(), embedded.dimension)?;
        let written = indexer.index(&embedded.corpus.chunks, &embedded.embeddings).await?;
        let meta = IndexMeta {
            embedder_id: self.embedder.embedder_id().to_string(),
            dim: embedded.dimension,
            chunk_count: written,
            document_count: embedded.corpus.report.documents.len(),
            built_at: Utc::now().to_rfc3339(),
        };
        write_meta(&conn, &meta).await?;
        Ok(written)
    }

    /// Same pipeline, kept in memory.
    pub async fn build_flat(&self, corpus_dir: &Path) -> Result<(FlatIndex, BuildReport)> {
        let embedded = self.embed_corpus(corpus_dir).await?;
        let report = self.report(&embedded, None);
        let index = FlatIndex::from_embedded(embedded.corpus.chunks, embedded.embeddings)?;
        Ok((index, report))
    }

    fn report(&self, embedded: &EmbeddedCorpus, index_dir: Option<PathBuf>) -> BuildReport {
        let report = &embedded.corpus.report;
        BuildReport {
            documents: report.documents.len(),
            chunks: embedded.corpus.chunks.len(),
            failures: report.failures.clone(),
            skipped: report.skipped.len(),
            dimension: embedded.dimension,
            embedder_id: self.embedder.embedder_id().to_string(),
            index_dir,
        }
    }

    async fn embed_corpus(&self, corpus_dir: &Path) -> Result<EmbeddedCorpus> {
        let corpus = self.processor.process_directory(corpus_dir)?;
        if corpus.chunks.is_empty() {
            return Err(Error::EmptyCorpus(corpus_dir.display().to_string()));
        }
        let embeddings = self.embed_chunks(&corpus.chunks).await?;
        let dimension = check_dimensions(&embeddings, self.embedder.dim())?;
        Ok(EmbeddedCorpus { corpus, embeddings, dimension })
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let pb = if self.show_progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .map_err(Error::operation)?
                .progress_chars("#>-"),
        );
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(Error::Embedding(format!(
                    "asked for {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                )));
            }
            embeddings.extend(vectors);
            pb.set_position(embeddings.len() as u64);
        }
        pb.finish_with_message("embedded");
        Ok(embeddings)
    }
}

/// Move the finished `staging` directory to `index_dir`, retiring any previous index.
fn swap_into_place(staging: &Path, index_dir: &Path) -> Result<()> {
    let retired = index_dir.with_file_name(format!(
        ".{}.old",
        index_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "index".to_string())
    ));
    if retired.exists() {
        fs::remove_dir_all(&retired).map_err(Error::operation)?;
    }
    if index_dir.exists() {
        fs::rename(index_dir, &retired).map_err(Error::operation)?;
    }
    if let Err(e) = fs::rename(staging, index_dir) {
        if retired.exists() {
            let _ = fs::rename(&retired, index_dir);
        }
        return Err(Error::operation(e));
    }
    if retired.exists() {
        if let Err(e) = fs::remove_dir_all(&retired) {
            warn!(path = %retired.display(), error = %e, "could not remove previous index");
        }
    }
    Ok(())
}

fn check_dimensions(embeddings: &[Vec<f32>], expected: Option<usize>) -> Result<usize> {
    let dim = embeddings.first().map(Vec::len).unwrap_or_default();
    if dim == 0 {
        return Err(Error::Embedding("embedding service returned empty vectors".into()));
    }
    if let Some(expected) = expected {
        if expected != dim {
            return Err(Error::Embedding(format!("expected {expected}-dimensional vectors, got {dim}")));
        }
    }
    if let Some(bad) = embeddings.iter().find(|v| v.len() != dim) {
        return Err(Error::Embedding(format!("mixed vector sizes: {dim} and {}", bad.len())));
    }
    Ok(dim)
}
