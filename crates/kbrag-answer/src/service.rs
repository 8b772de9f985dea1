use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use kbrag_core::config::{RetrievalSettings, Settings};
use kbrag_core::Result;
use kbrag_embed::get_default_embedder;
use kbrag_vector::IndexStore;

use crate::agent::{AnswerAgent, RetrieveContextTool};
use crate::chain::AnswerChain;
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::mode::{Answerer, Mode};
use crate::request::{ChatPayload, ChatRequest, ChatResponse};
use crate::retriever::Retriever;
use crate::shaper::ResultShaper;

/// Validates requests, dispatches to the chosen mode and attaches matches.
pub struct RagService {
    store: Arc<IndexStore>,
    model_id: String,
    chain: AnswerChain,
    agent: AnswerAgent,
    shaper: ResultShaper,
    retrieval: RetrievalSettings,
}

impl RagService {
    pub fn new(store: Arc<IndexStore>, model: Arc<dyn ChatModel>, settings: &Settings) -> Self {
        let retriever = Retriever::new(store.clone());
        let chain = AnswerChain::new(retriever.clone(), model.clone(), settings.chat.chain_temperature);
        let tool = RetrieveContextTool::new(retriever, settings.retrieval.max_k);
        let agent = AnswerAgent::new(tool, model.clone(), settings.chat.agent_temperature, settings.chat.max_agent_steps);
        Self {
            shaper: ResultShaper::new(store.clone()),
            model_id: model.model_id().to_string(),
            store,
            chain,
            agent,
            retrieval: settings.retrieval.clone(),
        }
    }

    /// Remote embedder (or the fake one), OpenAI-compatible chat model and the
    /// LanceDB index under `data.index_dir` resolved against `base_dir`.
    pub fn from_settings(settings: &Settings, base_dir: &Path) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding)?;
        let store = Arc::new(IndexStore::lance(settings.data.index_dir_path(base_dir), embedder));
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::from_settings(&settings.chat)?);
        Ok(Self::new(store, model, settings))
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn chat_json(&self, body: &str) -> Result<ChatResponse> {
        self.chat(ChatPayload::from_json(body)?).await
    }

    pub async fn chat(&self, payload: ChatPayload) -> Result<ChatResponse> {
        let request = payload.validate(&self.retrieval)?;
        self.answer(&request).await
    }

    pub async fn answer(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let started = Instant::now();
        let answer = self.answerer(request.mode).answer(&request.query, request.k).await?;
        let answered_ms = started.elapsed().as_millis();
        let matches = self.shaper.matches(&request.query, request.k).await?;
        info!(
            mode = %request.mode,
            k = request.k,
            matches = matches.len(),
            answer_ms = answered_ms,
            total_ms = started.elapsed().as_millis(),
            "chat answered"
        );
        Ok(ChatResponse { mode: request.mode, model: self.model_id.clone(), answer, matches })
    }

    fn answerer(&self, mode: Mode) -> &dyn Answerer {
        match mode {
            Mode::Chain => &self.chain,
            Mode::Agent => &self.agent,
        }
    }
}
