//! OpenAI-compatible LLM provider.
//!
//! Supports OpenAI, Azure OpenAI, Ollama, vLLM, LM Studio, and any
//! endpoint that follows the OpenAI chat completions API format.

use crate::brain::{LlmProvider, TokenCounter};
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::types::{
    CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

/// OpenAI-compatible LLM provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    context_window: usize,
    supports_tools: bool,
    token_counter: TokenCounter,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider from configuration.
    ///
    /// Reads the API key from the environment variable specified in `config.api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let is_local = config
            .base_url
            .as_ref()
            .map(|u| u.contains("localhost") || u.contains("127.0.0.1"))
            .unwrap_or(false);

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .or_else(|| {
                if is_local {
                    debug!("No API key set for local provider; using dummy bearer token");
                    Some("ollama".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| LlmError::AuthFailed {
                provider: format!(
                    "OpenAI-compatible: env var '{}' not set",
                    config.api_key_env
                ),
            })?;
        Self::new_with_key(config, api_key)
    }

    /// Create a new provider with an explicitly provided API key.
    pub fn new_with_key(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            base_url,
            api_key,
            model: config.model.clone(),
            context_window: config.context_window,
            supports_tools: true,
            token_counter: TokenCounter::for_model(&config.model),
        })
    }

    /// Convert internal messages to OpenAI JSON format.
    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    Role::Tool => "tool",
                };
                match &msg.content {
                    Content::Text { text } => json!({
                        "role": role,
                        "content": text,
                    }),
                    Content::ToolCall {
                        id,
                        name,
                        arguments,
                    } => json!({
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": arguments.to_string(),
                            }
                        }]
                    }),
                    Content::ToolResult {
                        call_id, output, ..
                    } => json!({
                        "role": "tool",
                        "tool_call_id": call_id,
                        "content": output,
                    }),
                    Content::MultiPart { parts } => {
                        let mut text_parts = Vec::new();
                        let mut tool_calls = Vec::new();
                        for part in parts {
                            match part {
                                Content::Text { text } => text_parts.push(text.clone()),
                                Content::ToolCall {
                                    id,
                                    name,
                                    arguments,
                                } => {
                                    tool_calls.push(json!({
                                        "id": id,
                                        "type": "function",
                                        "function": {
                                            "name": name,
                                            "arguments": arguments.to_string(),
                                        }
                                    }));
                                }
                                _ => {}
                            }
                        }
                        if !tool_calls.is_empty() {
                            json!({
                                "role": "assistant",
                                "content": if text_parts.is_empty() { Value::Null } else { Value::String(text_parts.join("\n")) },
                                "tool_calls": tool_calls,
                            })
                        } else {
                            json!({
                                "role": role,
                                "content": text_parts.join("\n"),
                            })
                        }
                    }
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI format.
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

    /// Parse an OpenAI-format response body into a CompletionResponse.
    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let choice =
            body.get("choices")
                .and_then(|c| c.get(0))
                .ok_or_else(|| LlmError::ResponseParse {
                    message: "No choices in response".to_string(),
                })?;

        let message = choice
            .get("message")
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message in choice".to_string(),
            })?;

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string());

        let content = if let Some(tool_calls) = message.get("tool_calls") {
            let calls: Vec<Content> = tool_calls
                .as_array()
                .unwrap_or(&vec![])
                .iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?.to_string();
                    let func = tc.get("function")?;
                    let name = func.get("name")?.as_str()?.to_string();
                    let args_str = func.get("arguments")?.as_str()?;
                    let arguments: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
                    Some(Content::ToolCall {
                        id,
                        name,
                        arguments,
                    })
                })
                .collect();

            if calls.len() == 1 {
                calls.into_iter().next().unwrap()
            } else if calls.is_empty() {
                Content::text(
                    message
                        .get("content")
                        .and_then(|c| c.as_str())
                        .unwrap_or(""),
                )
            } else {
                let mut parts = Vec::new();
                if let Some(text) = message.get("content").and_then(|c| c.as_str())
                    && !text.is_empty()
                {
                    parts.push(Content::text(text));
                }
                parts.extend(calls);
                Content::MultiPart { parts }
            }
        } else {
            Content::text(
                message
                    .get("content")
                    .and_then(|c| c.as_str())
                    .unwrap_or(""),
            )
        };

        let usage_obj = body.get("usage");
        let usage = TokenUsage {
            input_tokens: usage_obj
                .and_then(|u| u.get("prompt_tokens"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0) as usize,
            output_tokens: usage_obj
                .and_then(|u| u.get("completion_tokens"))
                .and_then(|t| t.as_u64())
                .unwrap_or(0) as usize,
        };

        let resp_model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string();

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, content),
            usage,
            model: resp_model,
            finish_reason,
        })
    }

    /// Map an HTTP status code to the appropriate LlmError.
    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 => {
                debug!(body = %body, "Authentication failed (401)");
                LlmError::AuthFailed {
                    provider: "OpenAI-compatible".to_string(),
                }
            }
            429 => {
                let retry_secs = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| {
                        v.get("error")?
                            .get("message")?
                            .as_str()
                            .map(|s| s.to_string())
                    })
                    .and_then(|msg| {
                        msg.split("in ")
                            .last()
                            .and_then(|s| s.trim_end_matches('s').parse::<u64>().ok())
                    })
                    .unwrap_or(5);
                LlmError::RateLimited {
                    retry_after_secs: retry_secs,
                }
            }
            status if status >= 500 => LlmError::ApiRequest {
                message: format!("Server error ({}): {}", status, body),
            },
            _ => LlmError::ApiRequest {
                message: format!("HTTP {}: {}", status, body),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let messages_json = Self::messages_to_json(&request.messages);
        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": messages_json,
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(tools) = &request.tools
            && !tools.is_empty()
        {
            body["tools"] = json!(Self::tools_to_json(tools));
        }

        debug!(url = %url, model = %self.model, "Sending OpenAI completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {}", e),
            })?;

        Self::parse_response(&json, &self.model)
    }

    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        self.token_counter.count_messages(messages)
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "VOYAGER_TEST_OPENAI_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            context_window: 128_000,
            retry: crate::config::RetryConfig::default(),
        }
    }

    #[test]
    fn test_messages_to_json_text() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::assistant("Hi there"),
        ];
        let json = OpenAiCompatibleProvider::messages_to_json(&messages);
        assert_eq!(json.len(), 3);
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[0]["content"], "You are helpful");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[2]["role"], "assistant");
    }

    #[test]
    fn test_messages_to_json_tool_call() {
        let msg = Message::new(
            Role::Assistant,
            Content::tool_call("call_123", "lookup_location", json!({"query": "Paris"})),
        );
        let json = OpenAiCompatibleProvider::messages_to_json(&[msg]);
        assert_eq!(json[0]["role"], "assistant");
        assert!(json[0]["tool_calls"].is_array());
        assert_eq!(json[0]["tool_calls"][0]["id"], "call_123");
        assert_eq!(
            json[0]["tool_calls"][0]["function"]["name"],
            "lookup_location"
        );
    }

    #[test]
    fn test_messages_to_json_tool_result() {
        let msg = Message::new(
            Role::Tool,
            Content::ToolResult {
                call_id: "call_123".to_string(),
                output: "CDG".to_string(),
                is_error: false,
            },
        );
        let json = OpenAiCompatibleProvider::messages_to_json(&[msg]);
        assert_eq!(json[0]["role"], "tool");
        assert_eq!(json[0]["tool_call_id"], "call_123");
        assert_eq!(json[0]["content"], "CDG");
    }

    #[test]
    fn test_tools_to_json() {
        let tools = vec![ToolDefinition {
            name: "lookup_location".to_string(),
            description: "Resolve a place name to an airport/city code".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" }
                }
            }),
        }];
        let json = OpenAiCompatibleProvider::tools_to_json(&tools);
        assert_eq!(json.len(), 1);
        assert_eq!(json[0]["type"], "function");
        assert_eq!(json[0]["function"]["name"], "lookup_location");
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "id": "chatcmpl-123",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Here is your itinerary."
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 8,
                "total_tokens": 18
            },
            "model": "gpt-4o"
        });
        let resp = OpenAiCompatibleProvider::parse_response(&body, "gpt-4o").unwrap();
        assert_eq!(
            resp.message.content.as_text().unwrap(),
            "Here is your itinerary."
        );
        assert_eq!(resp.usage.input_tokens, 10);
        assert_eq!(resp.usage.output_tokens, 8);
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.model, "gpt-4o");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body = json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "lookup_location",
                            "arguments": "{\"query\":\"Tokyo\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15
            },
            "model": "gpt-4o"
        });
        let resp = OpenAiCompatibleProvider::parse_response(&body, "gpt-4o").unwrap();
        match &resp.message.content {
            Content::ToolCall {
                id,
                name,
                arguments,
            } => {
                assert_eq!(id, "call_abc");
                assert_eq!(name, "lookup_location");
                assert_eq!(arguments["query"], "Tokyo");
            }
            other => panic!("Expected ToolCall, got {:?}", other),
        }
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn test_parse_response_no_choices() {
        let body = json!({"choices": []});
        let result = OpenAiCompatibleProvider::parse_response(&body, "gpt-4o");
        assert!(result.is_err());
    }

    #[test]
    fn test_http_error_mapping_401() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::UNAUTHORIZED,
            "Unauthorized",
        );
        match err {
            LlmError::AuthFailed { .. } => {}
            other => panic!("Expected AuthFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_http_error_mapping_429() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limit exceeded"}}"#,
        );
        match err {
            LlmError::RateLimited { .. } => {}
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_http_error_mapping_500() {
        let err = OpenAiCompatibleProvider::map_http_error(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        );
        match err {
            LlmError::ApiRequest { message } => {
                assert!(message.contains("500"));
            }
            other => panic!("Expected ApiRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_new_reads_env() {
        unsafe { std::env::set_var("VOYAGER_TEST_OPENAI_KEY", "sk-test-key") };
        let config = test_config();
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o");
        assert_eq!(provider.context_window(), 128_000);
        assert!(provider.supports_tools());
        unsafe { std::env::remove_var("VOYAGER_TEST_OPENAI_KEY") };
    }

    #[test]
    fn test_new_missing_key() {
        unsafe { std::env::remove_var("VOYAGER_TEST_OPENAI_KEY_MISSING") };
        let mut config = test_config();
        config.api_key_env = "VOYAGER_TEST_OPENAI_KEY_MISSING".to_string();
        let result = OpenAiCompatibleProvider::new(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_base_url() {
        unsafe { std::env::set_var("VOYAGER_TEST_OPENAI_KEY", "test-key") };
        let mut config = test_config();
        config.base_url = Some("http://localhost:11434/v1".to_string());
        let provider = OpenAiCompatibleProvider::new(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
        unsafe { std::env::remove_var("VOYAGER_TEST_OPENAI_KEY") };
    }

    #[test]
    fn test_ollama_provider_no_api_key_required() {
        unsafe { std::env::remove_var("VOYAGER_TEST_OLLAMA_KEY_NONEXISTENT") };
        let mut config = test_config();
        config.api_key_env = "VOYAGER_TEST_OLLAMA_KEY_NONEXISTENT".to_string();
        config.base_url = Some("http://localhost:11434/v1".to_string());
        config.model = "qwen2.5:14b".to_string();
        let result = OpenAiCompatibleProvider::new(&config);
        assert!(
            result.is_ok(),
            "Ollama localhost should not require API key"
        );
        let provider = result.unwrap();
        assert_eq!(provider.model_name(), "qwen2.5:14b");
    }

    #[test]
    fn test_remote_provider_still_requires_api_key() {
        unsafe { std::env::remove_var("VOYAGER_TEST_REMOTE_KEY_NONEXISTENT") };
        let mut config = test_config();
        config.api_key_env = "VOYAGER_TEST_REMOTE_KEY_NONEXISTENT".to_string();
        config.base_url = None;
        let result = OpenAiCompatibleProvider::new(&config);
        assert!(result.is_err(), "Remote provider must require API key");
    }
}
