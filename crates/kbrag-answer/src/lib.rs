pub mod agent;
pub mod chain;
pub mod context;
pub mod llm;
pub mod mode;
pub mod request;
pub mod retriever;
pub mod service;
pub mod shaper;

pub use agent::{AgentRun, AgentStep, AnswerAgent, RetrieveContextTool};
pub use chain::AnswerChain;
pub use context::format_context;
pub use mode::{Answerer, Mode};
pub use request::{ChatPayload, ChatRequest, ChatResponse};
pub use retriever::Retriever;
pub use service::RagService;
pub use shaper::{Match, MatchMeta, PageRef, ResultShaper};
