//! LLM provider abstraction.
//!
//! Defines the `LlmProvider` trait that any chat-completion backend meeting
//! the outbound contract in the spec (system+user messages, a tool-description
//! list, tool-call request/response turns, and a `finish_reason` distinguishing
//! "stop" from "interrupt/tool-call") can implement. The Planner is written
//! entirely against this trait and never assumes a concrete model family.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Content, Message, Role, TokenUsage, ToolDefinition};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::warn;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Estimate the token count for a set of messages.
    fn estimate_tokens(&self, messages: &[Message]) -> usize;

    /// Return the context window size for this provider/model.
    fn context_window(&self) -> usize;

    /// Return whether this provider supports tool/function calling. The
    /// Planner refuses to drive its tool-calling loop against a provider
    /// that returns `false` here.
    fn supports_tools(&self) -> bool;

    /// Return the model name.
    fn model_name(&self) -> &str;
}

/// Token counter using tiktoken-rs for accurate BPE tokenization.
pub struct TokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TokenCounter {
    /// Create a token counter for the given model.
    /// Falls back to cl100k_base if the model isn't recognized.
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model).unwrap_or_else(|_| {
            tiktoken_rs::cl100k_base().expect("cl100k_base should be available")
        });
        Self { bpe }
    }

    /// Count the number of tokens in a string.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Estimate the token count for a set of tool definitions.
    pub fn count_tool_definitions(&self, tools: &[ToolDefinition]) -> usize {
        let mut total = 0;
        for tool in tools {
            total += 10; // struct overhead (type, function wrapper, required fields)
            total += self.count(&tool.name);
            total += self.count(&tool.description);
            total += self.count(&tool.parameters.to_string());
        }
        total
    }

    /// Estimate the token count for a set of messages.
    pub fn count_messages(&self, messages: &[Message]) -> usize {
        let mut total = 0;
        for msg in messages {
            total += 4; // role token + separators
            total += self.count_content(&msg.content);
        }
        total + 3 // reply priming overhead
    }

    fn count_content(&self, content: &Content) -> usize {
        match content {
            Content::Text { text } => self.count(text),
            Content::ToolCall { name, arguments, .. } => {
                self.count(name) + self.count(&arguments.to_string())
            }
            Content::ToolResult { output, .. } => self.count(output),
            Content::MultiPart { parts } => parts.iter().map(|p| self.count_content(p)).sum(),
        }
    }
}

/// Sanitize tool_call → tool_result ordering in a message sequence.
///
/// This runs provider-agnostically before messages are sent to any LLM
/// provider, ensuring that:
/// 1. Every tool_result has a matching tool_call earlier in the sequence.
/// 2. No non-tool messages (repair system notes) appear between an assistant's
///    tool_call message and its corresponding tool_result message.
/// 3. Orphaned tool_results (no matching tool_call) are removed.
pub fn sanitize_tool_sequence(messages: &mut Vec<Message>) {
    let mut tool_call_ids: HashSet<String> = HashSet::new();
    for msg in messages.iter() {
        if msg.role != Role::Assistant {
            continue;
        }
        collect_tool_call_ids(&msg.content, &mut tool_call_ids);
    }

    messages.retain(|msg| {
        if msg.role != Role::Tool {
            return true;
        }
        match &msg.content {
            Content::ToolResult { call_id, .. } => {
                if tool_call_ids.contains(call_id) {
                    true
                } else {
                    warn!(call_id = call_id.as_str(), "removing orphaned tool_result");
                    false
                }
            }
            Content::MultiPart { parts } => {
                let has_valid = parts.iter().any(|p| {
                    if let Content::ToolResult { call_id, .. } = p {
                        tool_call_ids.contains(call_id)
                    } else {
                        true
                    }
                });
                if !has_valid {
                    warn!("removing multipart tool message with all orphaned tool_results");
                }
                has_valid
            }
            _ => true,
        }
    });

    let mut i = 0;
    while i + 1 < messages.len() {
        let has_tool_call =
            messages[i].role == Role::Assistant && content_has_tool_call(&messages[i].content);

        if has_tool_call {
            let mut j = i + 1;
            let mut to_relocate = Vec::new();
            while j < messages.len() && messages[j].role == Role::System {
                to_relocate.push(j);
                j += 1;
            }
            if !to_relocate.is_empty() {
                let mut extracted: Vec<Message> = Vec::new();
                for &idx in to_relocate.iter().rev() {
                    extracted.push(messages.remove(idx));
                }
                extracted.reverse();
                for (offset, msg) in extracted.into_iter().enumerate() {
                    messages.insert(i + offset, msg);
                    i += 1;
                }
            }
        }
        i += 1;
    }
}

fn collect_tool_call_ids(content: &Content, ids: &mut HashSet<String>) {
    match content {
        Content::ToolCall { id, .. } => {
            ids.insert(id.clone());
        }
        Content::MultiPart { parts } => {
            for part in parts {
                collect_tool_call_ids(part, ids);
            }
        }
        _ => {}
    }
}

fn content_has_tool_call(content: &Content) -> bool {
    match content {
        Content::ToolCall { .. } => true,
        Content::MultiPart { parts } => parts.iter().any(content_has_tool_call),
        _ => false,
    }
}

/// A mock LLM provider for testing and development.
///
/// Responses are queued up front and returned in order, one per `complete`
/// call; the last queued response repeats once exhausted.
pub struct MockLlmProvider {
    model: String,
    context_window: usize,
    responses: std::sync::Mutex<Vec<CompletionResponse>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            context_window: 128_000,
            responses: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Queue a response to be returned by a future `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.responses.lock().unwrap().push(response);
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage { input_tokens: 100, output_tokens: 50 },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Create a tool call response for testing.
    pub fn tool_call_response(tool_name: &str, arguments: serde_json::Value) -> CompletionResponse {
        let call_id = format!("call_{}", uuid::Uuid::new_v4());
        CompletionResponse {
            message: Message::new(Role::Assistant, Content::tool_call(&call_id, tool_name, arguments)),
            usage: TokenUsage { input_tokens: 100, output_tokens: 30 },
            model: "mock-model".to_string(),
            finish_reason: Some("tool_calls".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(Self::text_response("{\"itineraries\": [], \"reasoning\": \"no more mock responses\"}"));
        }
        if responses.len() == 1 {
            Ok(responses[0].clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    fn estimate_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| m.content_len() / 4).sum()
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

impl Message {
    /// Rough character length of this message's content, for cheap estimates.
    fn content_len(&self) -> usize {
        fn len(c: &Content) -> usize {
            match c {
                Content::Text { text } => text.len(),
                Content::ToolCall { name, arguments, .. } => name.len() + arguments.to_string().len(),
                Content::ToolResult { output, .. } => output.len(),
                Content::MultiPart { parts } => parts.iter().map(len).sum(),
            }
        }
        len(&self.content)
    }
}
