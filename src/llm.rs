//! Chat-model client with tool calling.
//!
//! The [`ChatModel`] trait is the seam between the orchestration loop and
//! the generative service: one request carries system instructions, the
//! conversation so far, and the declared tool schemas; one [`ModelTurn`]
//! comes back carrying either answer text, tool-call requests, or both.
//!
//! [`OpenAiChatModel`] speaks the OpenAI-compatible `/chat/completions`
//! wire format, which also covers Groq, Ollama's `/v1` endpoint, and
//! similar services. Transient failures (429, 5xx, network errors) retry
//! with exponential backoff; other client errors fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::GenerationConfig;
use crate::error::ModelError;

/// Declared schema for one tool the model may invoke.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the parameters object.
    pub parameters: Value,
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A message in the model exchange.
#[derive(Debug, Clone)]
pub enum ChatMessage {
    User(String),
    /// An assistant turn; carries tool calls when the model requested any.
    Assistant {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// The result of executing one requested tool call.
    ToolResult { call_id: String, content: String },
}

impl ChatMessage {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// One request to the generative service.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// The model's reply: answer text and/or requested tool calls.
#[derive(Debug, Clone)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelTurn {
    /// A turn with no tool calls is a direct answer.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// The generative service, reached through a request/response contract.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelTurn, ModelError>;
}

/// Client for OpenAI-compatible chat-completions endpoints.
pub struct OpenAiChatModel {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    /// Build a client from config. The API key is read from the
    /// environment variable named by `api_key_env`; when that variable is
    /// unset the request is sent without auth (local endpoints).
    pub fn new(config: &GenerationConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client,
        })
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut messages = vec![json!({ "role": "system", "content": request.system })];
        for message in &request.messages {
            messages.push(message_to_json(message));
        }

        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
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
                .collect();
            body["tools"] = Value::Array(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelTurn, ModelError> {
        let body = self.build_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body);
            if let Some(key) = &self.api_key {
                req = req.header("Authorization", format!("Bearer {}", key));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response
                            .json()
                            .await
                            .map_err(|e| ModelError::Malformed(e.to_string()))?;
                        return parse_chat_response(&json);
                    }

                    let message = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(ModelError::Api {
                            status: status.as_u16(),
                            message,
                        });
                        continue;
                    }

                    return Err(ModelError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(e) => {
                    last_err = Some(ModelError::Request(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ModelError::Request("chat request failed after retries".into())))
    }
}

fn message_to_json(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::User(text) => json!({ "role": "user", "content": text }),
        ChatMessage::Assistant { text, tool_calls } => {
            let mut value = json!({
                "role": "assistant",
                "content": text.clone().map(Value::String).unwrap_or(Value::Null),
            });
            if !tool_calls.is_empty() {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": c.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                value["tool_calls"] = Value::Array(calls);
            }
            value
        }
        ChatMessage::ToolResult { call_id, content } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": content,
        }),
    }
}

/// Parse a chat-completions response into a [`ModelTurn`].
fn parse_chat_response(json: &Value) -> Result<ModelTurn, ModelError> {
    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| ModelError::Malformed("missing choices[0].message".into()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|i| i.as_str())
                .ok_or_else(|| ModelError::Malformed("tool call missing id".into()))?
                .to_string();
            let name = call
                .pointer("/function/name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| ModelError::Malformed("tool call missing function name".into()))?
                .to_string();
            let raw_args = call
                .pointer("/function/arguments")
                .and_then(|a| a.as_str())
                .unwrap_or("{}");
            let arguments: Value = serde_json::from_str(raw_args)
                .map_err(|e| ModelError::Malformed(format!("bad tool arguments: {}", e)))?;
            tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    Ok(ModelTurn { text, tool_calls })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_answer() {
        let json = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "The answer is 42." },
                "finish_reason": "stop"
            }]
        });
        let turn = parse_chat_response(&json).unwrap();
        assert!(turn.is_final());
        assert_eq!(turn.text.as_deref(), Some("The answer is 42."));
    }

    #[test]
    fn test_parse_tool_calls() {
        let json = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search_course_content",
                            "arguments": "{\"query\": \"ownership\", \"lesson_number\": 2}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let turn = parse_chat_response(&json).unwrap();
        assert!(!turn.is_final());
        assert_eq!(turn.tool_calls.len(), 1);
        let call = &turn.tool_calls[0];
        assert_eq!(call.name, "search_course_content");
        assert_eq!(call.arguments["query"], "ownership");
        assert_eq!(call.arguments["lesson_number"], 2);
    }

    #[test]
    fn test_parse_malformed_arguments_rejected() {
        let json = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "x", "arguments": "not json" }
                    }]
                }
            }]
        });
        assert!(matches!(
            parse_chat_response(&json),
            Err(ModelError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_missing_choices_rejected() {
        let json = json!({ "error": { "message": "bad request" } });
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn test_message_serialization_shapes() {
        let user = message_to_json(&ChatMessage::User("hi".into()));
        assert_eq!(user["role"], "user");
        assert_eq!(user["content"], "hi");

        let assistant = message_to_json(&ChatMessage::Assistant {
            text: None,
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "search_course_content".into(),
                arguments: json!({ "query": "q" }),
            }],
        });
        assert_eq!(assistant["role"], "assistant");
        assert!(assistant["content"].is_null());
        assert_eq!(
            assistant["tool_calls"][0]["function"]["name"],
            "search_course_content"
        );
        // Arguments travel as a JSON-encoded string on the wire.
        assert!(assistant["tool_calls"][0]["function"]["arguments"].is_string());

        let tool = message_to_json(&ChatMessage::ToolResult {
            call_id: "call_1".into(),
            content: "results".into(),
        });
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_1");
    }
}
