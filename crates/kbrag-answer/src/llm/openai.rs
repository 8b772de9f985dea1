//! OpenAI-compatible `/chat/completions` client with tool calling.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use kbrag_core::config::ChatSettings;
use kbrag_core::{Error, Result};

use super::types::{Completion, CompletionRequest, Message, Role, ToolCall, ToolDefinition};
use super::ChatModel;

pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatModel {
    /// Reads the API key from `settings.api_key_env`. Local endpoints get a dummy key.
    pub fn from_settings(settings: &ChatSettings) -> Result<Self> {
        let is_local = settings.base_url.contains("localhost") || settings.base_url.contains("127.0.0.1");
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| is_local.then(|| "local".to_string()))
            .ok_or_else(|| {
                Error::InvalidConfig(format!("chat API key env var '{}' is not set", settings.api_key_env))
            })?;
        Ok(Self::new_with_key(settings, api_key))
    }

    pub fn new_with_key(settings: &ChatSettings, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
        }
    }

    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match msg.role {
                Role::System => json!({ "role": "system", "content": msg.content }),
                Role::User => json!({ "role": "user", "content": msg.content }),
                Role::Tool => json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content,
                }),
                Role::Assistant if msg.tool_calls.is_empty() => {
                    json!({ "role": "assistant", "content": msg.content })
                }
                Role::Assistant => {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|c| {
                            let arguments = match &c.arguments {
                                Value::String(raw) => raw.clone(),
                                other => other.to_string(),
                            };
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": { "name": c.name, "arguments": arguments },
                            })
                        })
                        .collect();
                    json!({
                        "role": "assistant",
                        "content": if msg.content.is_empty() { Value::Null } else { Value::String(msg.content.clone()) },
                        "tool_calls": calls,
                    })
                }
            })
            .collect()
    }

    fn tools_to_json(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn parse_response(body: &Value) -> Result<Completion> {
        let choice = body
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| Error::Completion("no choices in response".to_string()))?;
        let message = choice
            .get("message")
            .ok_or_else(|| Error::Completion("no message in choice".to_string()))?;
        let finish_reason = choice.get("finish_reason").and_then(Value::as_str).map(str::to_string);
        let content = message.get("content").and_then(Value::as_str).unwrap_or_default().to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();
                        let raw = func.get("arguments").and_then(Value::as_str).unwrap_or("{}");
                        let arguments = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
                        Some(ToolCall { id, name, arguments })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Completion { content, tool_calls, finish_reason })
    }
}

fn map_http_error(status: reqwest::StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    match status.as_u16() {
        401 | 403 => Error::Completion(format!("authentication failed ({status}): {detail}")),
        429 => Error::Completion(format!("rate limited: {detail}")),
        _ => Error::Completion(format!("HTTP {status}: {detail}")),
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = json!({
            "model": self.model,
            "messages": Self::messages_to_json(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(Self::tools_to_json(&request.tools));
        }
        debug!(url = %url, model = %self.model, messages = request.messages.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Completion(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(map_http_error(status, &text));
        }
        let json: Value =
            serde_json::from_str(&text).map_err(|e| Error::Completion(format!("invalid response JSON: {e}")))?;
        Self::parse_response(&json)
    }
}
