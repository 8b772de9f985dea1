//! Chat completion clients.

pub mod openai;
pub mod types;

use async_trait::async_trait;

use kbrag_core::Result;

pub use openai::OpenAiChatModel;
pub use types::{Completion, CompletionRequest, Message, Role, ToolCall, ToolDefinition};

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name reported back to API callers.
    fn model_id(&self) -> &str;
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
