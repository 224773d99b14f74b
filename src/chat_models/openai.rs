use std::collections::HashMap;
use std::env;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::chat_models::error::ChatError;
use crate::chat_models::response::{ChatModelResponse, FunctionCall, ResponseOptions};
use crate::chat_models::runtime::{RequestFailure, RetryPolicy, post_json_with_retry};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Role-tagged chat message in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Fully resolved settings for one chat invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub base_url: String,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub retry: RetryPolicy,
}

impl ChatSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            system: None,
            temperature: None,
            max_tokens: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Chat-completions endpoint derived from `base_url`.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Message list sent for a single user prompt.
    pub fn messages_for(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system.as_deref().filter(|value| !value.trim().is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
}

#[derive(Debug, Deserialize)]
struct ToolCallPayload {
    id: Option<String>,
    function: FunctionPayload,
}

#[derive(Debug, Deserialize)]
struct FunctionPayload {
    name: Option<String>,
    arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

/// Client for OpenAI-compatible chat-completions endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    settings: ChatSettings,
}

impl OpenAiChat {
    pub fn new(api_key: impl Into<String>, settings: ChatSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            settings,
        }
    }

    /// Reads the API key from the environment variable `key_env`.
    pub fn from_env(key_env: &str, settings: ChatSettings) -> Result<Self, ChatError> {
        let api_key = env::var(key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ChatError::MissingApiKey {
                key_env: key_env.to_string(),
            })?;
        Ok(Self::new(api_key, settings))
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Sends one prompt and always returns a response; failures land in its
    /// `error` slot.
    pub async fn chat(&self, prompt: &str) -> ChatModelResponse {
        let messages = self.settings.messages_for(prompt);
        let started = Instant::now();

        match self.send(&messages).await {
            Ok(response) => response,
            Err(err) => {
                info!(error = %err, "chat request failed");
                let mut metadata = self.base_metadata(started);
                if let Some(attempts) = err.attempts() {
                    metadata.insert("attempts".to_string(), json!(attempts));
                }
                ChatModelResponse::failed(err.to_string()).with_metadata(metadata)
            }
        }
    }

    /// Sends a message list and decodes the first choice.
    pub async fn send(&self, messages: &[ChatMessage]) -> Result<ChatModelResponse, ChatError> {
        let started = Instant::now();
        let url = self.settings.endpoint();
        let payload = ChatCompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let delivered =
            post_json_with_retry(&self.client, &url, &self.api_key, &payload, self.settings.retry)
                .await
                .map_err(|failure| match failure {
                    RequestFailure::Transport { source, attempts } => {
                        ChatError::Request { source, attempts }
                    }
                    RequestFailure::Api {
                        status,
                        body,
                        attempts,
                    } => ChatError::Api {
                        status,
                        body,
                        attempts,
                    },
                })?;

        let body: ChatCompletionResponse = delivered
            .response
            .json()
            .await
            .map_err(ChatError::Decode)?;

        let mut metadata = self.base_metadata(started);
        metadata.insert("attempts".to_string(), json!(delivered.attempts));
        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            attempts = delivered.attempts,
            "chat response received"
        );

        decode_completion(body, metadata)
    }

    fn base_metadata(&self, started: Instant) -> HashMap<String, Value> {
        let mut metadata = HashMap::new();
        metadata.insert("model".to_string(), json!(self.settings.model));
        metadata.insert("provider_url".to_string(), json!(self.settings.endpoint()));
        metadata.insert(
            "latency_ms".to_string(),
            json!(started.elapsed().as_millis() as u64),
        );
        metadata
    }
}

fn decode_completion(
    body: ChatCompletionResponse,
    mut metadata: HashMap<String, Value>,
) -> Result<ChatModelResponse, ChatError> {
    if let Some(usage) = &body.usage {
        metadata.insert("usage".to_string(), json!(usage));
    }

    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or(ChatError::EmptyResponse)?;
    if let Some(reason) = choice.finish_reason {
        metadata.insert("finish_reason".to_string(), Value::String(reason));
    }

    let message = choice.message.content.unwrap_or_default();
    let function_calls = parse_function_calls(choice.message.tool_calls);
    if message.is_empty() && function_calls.is_none() {
        return Err(ChatError::EmptyResponse);
    }

    Ok(ChatModelResponse::with_options(
        message,
        ResponseOptions {
            function_calls,
            error: None,
            metadata,
        },
    ))
}

fn parse_function_calls(payloads: Vec<ToolCallPayload>) -> Option<Vec<FunctionCall>> {
    let calls = payloads
        .into_iter()
        .filter_map(|payload| {
            let name = payload.function.name.filter(|name| !name.is_empty())?;
            let arguments = match payload.function.arguments {
                Some(Value::String(raw)) => {
                    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
                }
                Some(other) => other,
                None => Value::Null,
            };
            Some(FunctionCall::new(
                payload.id.unwrap_or_default(),
                name,
                arguments,
            ))
        })
        .collect::<Vec<_>>();

    (!calls.is_empty()).then_some(calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Result<ChatModelResponse, ChatError> {
        let body: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        decode_completion(body, HashMap::new())
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let mut settings = ChatSettings::new("m");
        settings.base_url = "http://localhost:8080/v1/".to_string();
        assert_eq!(settings.endpoint(), "http://localhost:8080/v1/chat/completions");

        settings.base_url = "http://localhost:8080/v1".to_string();
        assert_eq!(settings.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn blank_system_prompt_is_not_sent() {
        let mut settings = ChatSettings::new("m");
        settings.system = Some("   ".to_string());
        assert_eq!(settings.messages_for("hi"), vec![ChatMessage::user("hi")]);

        settings.system = Some("Be brief.".to_string());
        let messages = settings.messages_for("hi");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("Be brief."));
    }

    #[test]
    fn request_omits_unset_sampling_fields() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            temperature: None,
            max_tokens: Some(64),
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"gpt-4o-mini\""));
        assert!(json.contains("\"max_tokens\":64"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn decodes_content_usage_and_finish_reason() {
        let response = decode(
            r#"{
                "choices": [
                    {"message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}
                ],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(response.message(), "Hi there");
        assert!(response.function_calls().is_none());
        assert_eq!(response.metadata()["finish_reason"], json!("stop"));
        assert_eq!(response.metadata()["usage"]["total_tokens"], json!(5));
    }

    #[test]
    fn decodes_tool_calls_in_order() {
        let response = decode(
            r#"{
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [
                            {"id": "a", "type": "function", "function": {"name": "first", "arguments": "{\"x\":1}"}},
                            {"id": "b", "type": "function", "function": {"name": "", "arguments": "{}"}},
                            {"id": "c", "type": "function", "function": {"name": "second", "arguments": "not json"}}
                        ]
                    },
                    "finish_reason": "tool_calls"
                }]
            }"#,
        )
        .unwrap();

        let calls = response.function_calls().unwrap();
        assert_eq!(response.message(), "");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], FunctionCall::new("a", "first", json!({"x": 1})));
        assert_eq!(calls[1], FunctionCall::new("c", "second", json!("not json")));
    }

    #[test]
    fn empty_choice_is_an_error() {
        assert!(matches!(
            decode(r#"{"choices": []}"#),
            Err(ChatError::EmptyResponse)
        ));
        assert!(matches!(
            decode(r#"{"choices": [{"message": {"content": ""}, "finish_reason": null}]}"#),
            Err(ChatError::EmptyResponse)
        ));
    }

    #[test]
    fn missing_api_key_is_reported_by_name() {
        let err = OpenAiChat::from_env(
            "AIAGENTS_TEST_KEY_THAT_IS_NEVER_SET",
            ChatSettings::new("m"),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "AIAGENTS_TEST_KEY_THAT_IS_NEVER_SET is not set in the environment"
        );
    }
}
