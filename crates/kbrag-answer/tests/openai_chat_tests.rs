use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kbrag_answer::agent::RetrieveContextTool;
use kbrag_answer::llm::{ChatModel, CompletionRequest, Message, OpenAiChatModel, ToolCall};
use kbrag_core::config::ChatSettings;
use kbrag_core::Error;

fn model(base_url: String) -> OpenAiChatModel {
    OpenAiChatModel::new_with_key(&ChatSettings { base_url, ..ChatSettings::default() }, "sk-test".to_string())
}

#[tokio::test]
async fn text_completion_round_trip() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4.1-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "20 days."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let m = model(mock_server.uri());
    assert_eq!(m.model_id(), "gpt-4.1-mini");
    let completion = m
        .complete(CompletionRequest {
            messages: vec![Message::system("ctx"), Message::user("Question: PTO?")],
            temperature: 0.2,
            tools: Vec::new(),
        })
        .await
        .unwrap();
    assert_eq!(completion.content, "20 days.");
    assert!(completion.tool_calls.is_empty());
    assert_eq!(completion.finish_reason.as_deref(), Some("stop"));

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["model"], "gpt-4.1-mini");
    assert_eq!(body["messages"][0], json!({"role": "system", "content": "ctx"}));
    assert_eq!(body["messages"][1]["role"], "user");
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn tool_calls_are_parsed_and_tool_turns_serialized() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "retrieve_context", "arguments": "{\"query\":\"PTO\",\"k\":2}"}
                    }, {
                        "id": "call_bad",
                        "type": "function",
                        "function": {"name": "retrieve_context", "arguments": "{not json"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&mock_server)
        .await;

    let previous_call = ToolCall { id: "call_0".into(), name: "retrieve_context".into(), arguments: json!({"query": "leave"}) };
    let completion = model(mock_server.uri())
        .complete(CompletionRequest {
            messages: vec![
                Message::system("sys"),
                Message::user("PTO?"),
                Message::assistant_tool_calls("", vec![previous_call]),
                Message::tool_result("call_0", "Source: leave.txt\nLeave policy"),
            ],
            temperature: 0.1,
            tools: vec![RetrieveContextTool::definition()],
        })
        .await
        .unwrap();

    assert_eq!(completion.content, "");
    assert_eq!(completion.tool_calls.len(), 2);
    assert_eq!(completion.tool_calls[0].id, "call_abc");
    assert_eq!(completion.tool_calls[0].arguments, json!({"query": "PTO", "k": 2}));
    assert_eq!(completion.tool_calls[1].arguments, Value::String("{not json".into()));

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "retrieve_context");
    let assistant = &body["messages"][2];
    assert_eq!(assistant["content"], Value::Null);
    assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"query\":\"leave\"}");
    assert_eq!(body["messages"][3], json!({"role": "tool", "tool_call_id": "call_0", "content": "Source: leave.txt\nLeave policy"}));
}

#[tokio::test]
async fn non_success_status_is_a_completion_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "slow down"}})))
        .mount(&mock_server)
        .await;

    let err = model(mock_server.uri())
        .complete(CompletionRequest { messages: vec![Message::user("hi")], temperature: 0.2, tools: Vec::new() })
        .await
        .unwrap_err();
    match err {
        Error::Completion(message) => assert!(message.contains("slow down"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn response_without_choices_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let err = model(mock_server.uri())
        .complete(CompletionRequest { messages: vec![Message::user("hi")], temperature: 0.2, tools: Vec::new() })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "completion_service");
}
