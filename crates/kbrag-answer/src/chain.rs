use std::sync::Arc;
use tracing::debug;

use kbrag_core::Result;

use crate::context::format_context;
use crate::llm::{ChatModel, CompletionRequest, Message};
use crate::retriever::Retriever;

/// Retrieve once, stuff the context into the system prompt, complete once.
pub struct AnswerChain {
    retriever: Retriever,
    model: Arc<dyn ChatModel>,
    temperature: f32,
}

pub fn system_prompt(context: &str) -> String {
    format!("You are a helpful internal assistant.\n<context>\n{context}\n</context>")
}

pub fn user_prompt(question: &str) -> String {
    format!("Question: {question}")
}

impl AnswerChain {
    pub fn new(retriever: Retriever, model: Arc<dyn ChatModel>, temperature: f32) -> Self {
        Self { retriever, model, temperature }
    }

    pub async fn answer(&self, question: &str, k: usize) -> Result<String> {
        let chunks = self.retriever.retrieve(question, k).await?;
        let context = format_context(&chunks);
        debug!(chunks = chunks.len(), context_chars = context.len(), "chain context built");
        let request = CompletionRequest {
            messages: vec![Message::system(system_prompt(&context)), Message::user(user_prompt(question))],
            temperature: self.temperature,
            tools: Vec::new(),
        };
        Ok(self.model.complete(request).await?.content)
    }
}
