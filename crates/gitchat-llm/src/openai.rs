//! OpenAI-compatible chat-completions provider.
//!
//! # Endpoint format
//!
//! - POST `{base_url}/chat/completions`
//! - Request: `{"model", "messages", "tools"?, "tool_choice"?,
//!   "response_format"?, "temperature"?}`
//! - Response: `{"choices": [{"message": {...}, "finish_reason": "..."}]}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};
use crate::provider::ChatProvider;
use crate::types::{ChatRequest, ChatResponse, Message, ResponseFormat, ToolCall, ToolDefinition};

/// Base delay for exponential backoff.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Configuration for the OpenAI-compatible chat client.
#[derive(Debug, Clone)]
pub struct OpenAiChatConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Serialize)]
struct ResponseFormatWire<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatWire<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiChatClient {
    client: Client,
    config: OpenAiChatConfig,
}

impl OpenAiChatClient {
    pub fn new(config: OpenAiChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::InvalidConfig(format!("HTTP client error: {e}")))?;
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    async fn chat_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut retry_delay = RETRY_BASE_DELAY;

        for attempt in 0..=self.config.max_retries {
            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() || attempt == self.config.max_retries => {
                    return Err(e);
                }
                Err(_) => {
                    tokio::time::sleep(retry_delay).await;
                    retry_delay = (retry_delay * 2).min(Duration::from_secs(10));
                }
            }
        }
        unreachable!("loop always returns")
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.completions_url();
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: &request.messages,
            tools: request.tools.as_deref(),
            tool_choice: request.tools.as_ref().map(|_| "auto"),
            response_format: request.response_format.map(|f| ResponseFormatWire {
                format_type: match f {
                    ResponseFormat::Text => "text",
                    ResponseFormat::JsonObject => "json_object",
                },
            }),
            temperature: request.temperature,
        };

        let mut http_request = self.client.post(&url).json(&body);
        if let Some(ref api_key) = self.config.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = http_request.send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let parsed: ChatCompletionResponse =
                    response.json().await.map_err(LlmError::Request)?;
                let choice = parsed
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| LlmError::EmptyResponse { endpoint: url.clone() })?;
                Ok(ChatResponse {
                    content: choice.message.content,
                    tool_calls: choice.message.tool_calls.unwrap_or_default(),
                    finish_reason: choice.finish_reason,
                })
            }
            StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                Err(LlmError::Auth(body))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                Err(LlmError::RateLimit { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(LlmError::Status {
                    status,
                    endpoint: url,
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.chat_with_retry(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolDefinition;

    fn test_config(server: &wiremock::MockServer) -> OpenAiChatConfig {
        OpenAiChatConfig {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            model: "gpt-4o".into(),
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn chat_sends_bearer_auth_and_parses_content() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "hello"},
                    "finish_reason": "stop",
                }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new(test_config(&server)).unwrap();
        let response = client
            .chat(ChatRequest::new(vec![Message::user("hi")]))
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("hello"));
        assert!(!response.has_tool_calls());
    }

    #[tokio::test]
    async fn chat_parses_tool_calls() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "search_code", "arguments": "{\"pattern\":\"foo\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls",
                }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new(test_config(&server)).unwrap();
        let tool = ToolDefinition::new("search_code", "search", serde_json::json!({"type": "object"}));
        let response = client
            .chat(ChatRequest::new(vec![Message::user("find foo")]).with_tools(vec![tool]))
            .await
            .unwrap();

        assert!(response.has_tool_calls());
        assert_eq!(response.tool_calls[0].function.name, "search_code");
        assert_eq!(response.finish_reason, "tool_calls");
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new(test_config(&server)).unwrap();
        let result = client.chat(ChatRequest::new(vec![Message::user("hi")])).await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
    }

    #[tokio::test]
    async fn json_response_format_is_sent() {
        use wiremock::matchers::{body_partial_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "{}"},
                    "finish_reason": "stop",
                }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiChatClient::new(test_config(&server)).unwrap();
        let response = client
            .chat(ChatRequest::new(vec![Message::user("plan")]).with_json_response())
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("{}"));
    }
}
