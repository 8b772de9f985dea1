//! Tool-calling answer mode.
//!
//! The model gets one tool, `retrieve_context`, and decides how many times to
//! call it. Each tool round is recorded with the raw chunks it returned. The
//! number of rounds is capped; a model that keeps asking for tools past the cap
//! ends the run with [`Error::MaxStepsExceeded`].

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use kbrag_core::types::Chunk;
use kbrag_core::{Error, Result};

use crate::context::format_context;
use crate::llm::{ChatModel, CompletionRequest, Message, ToolCall, ToolDefinition};
use crate::retriever::Retriever;

pub const AGENT_SYSTEM_PROMPT: &str =
    "You may call tools to retrieve internal context. Useful for questions about policies and internal documents.";
pub const RETRIEVE_TOOL_NAME: &str = "retrieve_context";
/// `k` used when the model calls `retrieve_context` without one.
pub const DEFAULT_TOOL_K: usize = 3;

#[derive(Debug, Deserialize)]
struct RetrieveArgs {
    query: String,
    k: Option<i64>,
}

/// Formatted context for the model plus the chunks behind it.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub artifact: Vec<Chunk>,
}

#[derive(Clone)]
pub struct RetrieveContextTool {
    retriever: Retriever,
    max_k: usize,
}

impl RetrieveContextTool {
    pub fn new(retriever: Retriever, max_k: usize) -> Self {
        Self { retriever, max_k }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: RETRIEVE_TOOL_NAME.to_string(),
            description: "Retrieve relevant internal documents for a natural language query.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The user's question." },
                    "k": { "type": "integer", "description": "Number of documents to retrieve.", "default": DEFAULT_TOOL_K }
                },
                "required": ["query"]
            }),
        }
    }

    /// Bad arguments come back as `Err(message)` for the model to read; retrieval
    /// failures are real errors and abort the run.
    pub async fn call(&self, arguments: &Value) -> Result<std::result::Result<ToolOutput, String>> {
        let args: RetrieveArgs = match serde_json::from_value(arguments.clone()) {
            Ok(args) => args,
            Err(e) => return Ok(Err(format!("invalid arguments for {RETRIEVE_TOOL_NAME}: {e}"))),
        };
        if args.query.trim().is_empty() {
            return Ok(Err("query must not be empty".to_string()));
        }
        let k = match args.k {
            None => DEFAULT_TOOL_K.min(self.max_k),
            Some(k) if k >= 1 => usize::try_from(k).unwrap_or(self.max_k).min(self.max_k),
            Some(k) => return Ok(Err(format!("k must be at least 1, got {k}"))),
        };
        let chunks = self.retriever.retrieve(&args.query, k).await?;
        Ok(Ok(ToolOutput { content: format_context(&chunks), artifact: chunks }))
    }
}

/// One executed tool call.
#[derive(Debug, Clone)]
pub struct AgentStep {
    pub call: ToolCall,
    pub output: String,
    pub artifact: Vec<Chunk>,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub struct AgentRun {
    pub answer: String,
    pub steps: Vec<AgentStep>,
    /// Tool-calling rounds taken before the final answer.
    pub rounds: usize,
}

pub struct AnswerAgent {
    tool: RetrieveContextTool,
    model: Arc<dyn ChatModel>,
    temperature: f32,
    max_steps: usize,
}

impl AnswerAgent {
    pub fn new(tool: RetrieveContextTool, model: Arc<dyn ChatModel>, temperature: f32, max_steps: usize) -> Self {
        Self { tool, model, temperature, max_steps }
    }

    pub async fn run(&self, question: &str) -> Result<AgentRun> {
        let mut messages = vec![Message::system(AGENT_SYSTEM_PROMPT), Message::user(question)];
        let mut steps = Vec::new();
        let mut rounds = 0usize;
        loop {
            let request = CompletionRequest {
                messages: messages.clone(),
                temperature: self.temperature,
                tools: vec![RetrieveContextTool::definition()],
            };
            let completion = self.model.complete(request).await?;
            if completion.tool_calls.is_empty() {
                debug!(rounds, tool_calls = steps.len(), "agent finished");
                return Ok(AgentRun { answer: completion.content, steps, rounds });
            }
            if rounds == self.max_steps {
                warn!(max_steps = self.max_steps, "agent still calling tools at the step limit");
                return Err(Error::MaxStepsExceeded(self.max_steps));
            }
            rounds += 1;

            messages.push(Message::assistant_tool_calls(completion.content, completion.tool_calls.clone()));
            for call in completion.tool_calls {
                let step = self.execute(call).await?;
                messages.push(Message::tool_result(step.call.id.clone(), step.output.clone()));
                steps.push(step);
            }
        }
    }

    async fn execute(&self, call: ToolCall) -> Result<AgentStep> {
        if call.name != RETRIEVE_TOOL_NAME {
            let output = format!("Error: unknown tool '{}'", call.name);
            return Ok(AgentStep { call, output, artifact: Vec::new(), is_error: true });
        }
        let step = match self.tool.call(&call.arguments).await? {
            Ok(out) => {
                debug!(chunks = out.artifact.len(), "retrieve_context");
                AgentStep { call, output: out.content, artifact: out.artifact, is_error: false }
            }
            Err(message) => AgentStep { call, output: format!("Error: {message}"), artifact: Vec::new(), is_error: true },
        };
        Ok(step)
    }
}
