#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kbrag_answer::llm::{ChatModel, Completion, CompletionRequest, ToolCall};
use kbrag_core::config::Settings;
use kbrag_core::traits::Embedder;
use kbrag_core::types::Chunk;
use kbrag_core::{Error, Result};
use kbrag_embed::FakeEmbedder;
use kbrag_vector::{FlatIndex, IndexStore, PreloadedOpener};

pub const DIM: usize = 256;

pub const CORPUS: [(&str, &str); 4] = [
    ("/data/raw/pto.txt", "Employees receive 20 days of PTO annually. PTO requests go to your manager."),
    ("/data/raw/remote.txt", "Remote work is allowed two days per week with manager approval."),
    ("/data/raw/security.txt", "Badges must be worn at all times inside the office building."),
    ("/data/raw/expenses.txt", "Submit expense reports within 30 days with itemized receipts."),
];

/// Plays back canned completions and records every request.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Completion>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Completion>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), requests: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, i: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Completion("script exhausted".into()))
    }
}

/// Asks for `retrieve_context` on every turn.
pub struct AlwaysToolModel {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for AlwaysToolModel {
    fn model_id(&self) -> &str {
        "looping-model"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<Completion> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion::with_tool_calls(vec![tool_call(&format!("call_{n}"), "retrieve_context", serde_json::json!({"query": "PTO"}))]))
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall { id: id.to_string(), name: name.to_string(), arguments }
}

/// FakeEmbedder that counts service calls.
pub struct CountingEmbedder {
    inner: FakeEmbedder,
    pub calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: FakeEmbedder::new(DIM), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str {
        self.inner.embedder_id()
    }

    fn dim(&self) -> Option<usize> {
        self.inner.dim()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

pub fn chunk(source: &str, index: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("{source}:{index}"),
        text: text.to_string(),
        source_path: source.to_string(),
        page: None,
        chunk_index: index,
    }
}

pub fn store_from(docs: &[(&str, &str)], embedder: Arc<CountingEmbedder>) -> Arc<IndexStore> {
    let fake = FakeEmbedder::new(DIM);
    let chunks: Vec<Chunk> = docs.iter().map(|(src, text)| chunk(src, 0, text)).collect();
    let vectors = docs.iter().map(|(_, text)| fake.embed_text(text)).collect();
    let index = FlatIndex::from_embedded(chunks, vectors).unwrap();
    Arc::new(IndexStore::new(Arc::new(PreloadedOpener(Arc::new(index))), embedder))
}

pub fn corpus_store(embedder: Arc<CountingEmbedder>) -> Arc<IndexStore> {
    store_from(&CORPUS, embedder)
}

pub fn settings() -> Settings {
    Settings::default()
}
