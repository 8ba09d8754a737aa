//! The Planner: a single-shot entry point that drives a bounded tool-calling
//! conversation with an LLM and returns either a structured itinerary
//! proposal or a request for clarification.
//!
//! Grounded in the teacher's agent Think→Act→Observe loop (`agent.rs`):
//! the turn cap, the `ask_user` pseudo-tool special-case, and the
//! closure-based tool executor type are all carried over, generalized from
//! "arbitrary agent tools" to "the three read-only planning capabilities".

use crate::brain::{sanitize_tool_sequence, LlmProvider};
use crate::config::{LocationConfig, PlannerConfig};
use crate::error::PlannerError;
use crate::itinerary::Itinerary;
use crate::types::{CompletionRequest, Content, Message, Role, ToolDefinition, ToolOutput};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A capability executor function. Mirrors the teacher's `ToolExecutor`
/// closure type, generalized to the Planner's read-only capabilities.
pub type CapabilityExecutor = Box<
    dyn Fn(
            serde_json::Value,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<ToolOutput, String>> + Send>,
        > + Send
        + Sync,
>;

/// A registered read-only capability (date, location, currency, ...).
pub struct RegisteredCapability {
    pub definition: ToolDefinition,
    pub executor: CapabilityExecutor,
}

const ASK_USER_TOOL: &str = "ask_user";

/// The outcome of a single `plan` call.
#[derive(Debug, Clone)]
pub enum PlanResult {
    /// The planner needs more information before it can propose a trip.
    Clarification { question: String },
    /// A structured proposal: exactly one primary itinerary plus zero or
    /// more alternatives with identical schema.
    Proposal {
        itinerary: Itinerary,
        alternatives: Vec<Itinerary>,
        reasoning: String,
    },
}

/// The JSON document the LLM must emit to terminate the planning loop
/// successfully: `{itineraries: [...], reasoning: str}`.
#[derive(Debug, Deserialize, Serialize)]
struct PlannerOutput {
    itineraries: Vec<Itinerary>,
    #[serde(default)]
    reasoning: String,
}

/// Drives the bounded tool-calling conversation described in spec §4.3.
pub struct Planner {
    provider: Arc<dyn LlmProvider>,
    capabilities: HashMap<String, RegisteredCapability>,
    config: PlannerConfig,
    location_config: LocationConfig,
}

impl Planner {
    pub fn new(provider: Arc<dyn LlmProvider>, config: PlannerConfig) -> Self {
        Self { provider, capabilities: HashMap::new(), config, location_config: LocationConfig::default() }
    }

    pub fn with_location_config(mut self, location_config: LocationConfig) -> Self {
        self.location_config = location_config;
        self
    }

    pub fn register_capability(&mut self, capability: RegisteredCapability) {
        self.capabilities.insert(capability.definition.name.clone(), capability);
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.capabilities.values().map(|c| c.definition.clone()).collect();
        defs.push(ToolDefinition {
            name: ASK_USER_TOOL.to_string(),
            description: "Ask the user a clarifying question before proposing a trip. Use this only when the query is genuinely ambiguous.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "description": "The question to ask the user" }
                },
                "required": ["question"]
            }),
        });
        defs
    }

    fn system_prompt(&self) -> String {
        format!(
            "Today's date is {}. You are a travel-planning assistant. \
            Propose itineraries as a single JSON document matching this schema: \
            {{\"itineraries\": [Itinerary...], \"reasoning\": string}}. \
            An Itinerary has title, description, start_time, end_time, travelers, \
            journey_type (ONE_WAY or RETURN), and a graph of nodes (stays/locations) \
            and edges (transports). RETURN trips must close the cycle by reusing the \
            starting node id; do not introduce a duplicate 'home' node. \
            You may call the following read-only capabilities to resolve dates, \
            locations, and currencies: date, location, currency. \
            You have no access to flight search, hotel search, or booking tools — \
            those are handled by a separate verification step. \
            If the request is ambiguous, call `{ASK_USER_TOOL}` instead of guessing.",
            Utc::now().format("%Y-%m-%d")
        )
    }

    /// `plan(ctx, {user_query, history}) -> PlanResult`, wrapped in the
    /// planner-wide deadline from configuration.
    pub async fn plan(
        &self,
        user_query: &str,
        history: &str,
        cancellation: &CancellationToken,
    ) -> Result<PlanResult, PlannerError> {
        let deadline = std::time::Duration::from_secs(self.config.deadline_secs);
        match tokio::time::timeout(deadline, self.plan_inner(user_query, history, cancellation)).await {
            Ok(result) => result,
            Err(_) => Err(PlannerError::DeadlineExpired { timeout_secs: self.config.deadline_secs }),
        }
    }

    async fn plan_inner(
        &self,
        user_query: &str,
        history: &str,
        cancellation: &CancellationToken,
    ) -> Result<PlanResult, PlannerError> {
        let mut messages = vec![Message::system(self.system_prompt())];
        if !history.is_empty() {
            messages.push(Message::system(history.to_string()));
        }
        messages.push(Message::user(user_query.to_string()));

        let tools = self.tool_definitions();
        let mut last_text = String::new();

        for turn in 0..self.config.max_turns {
            if cancellation.is_cancelled() {
                return Err(PlannerError::Cancelled);
            }

            sanitize_tool_sequence(&mut messages);
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: Some(tools.clone()),
                ..Default::default()
            };
            let response = self.provider.complete(request).await?;
            messages.push(response.message.clone());

            match Self::extract_tool_call(&response.message.content) {
                Some((call_id, name, arguments)) if name == ASK_USER_TOOL => {
                    let question = arguments
                        .get("question")
                        .and_then(|v| v.as_str())
                        .unwrap_or("Can you provide more details about your trip?")
                        .to_string();
                    debug!(call_id = call_id.as_str(), "planner requested clarification");
                    return Ok(PlanResult::Clarification { question });
                }
                Some((call_id, name, arguments)) => {
                    let output = self.execute_capability(&name, arguments).await;
                    let msg = match output {
                        Ok(out) => Message::tool_result(&call_id, out.content, false),
                        Err(e) => Message::tool_result(&call_id, e, true),
                    };
                    messages.push(msg);
                    continue;
                }
                None => {
                    if let Some(text) = response.message.content.as_text() {
                        last_text = text.to_string();
                        if let Some(mut parsed) = Self::try_parse_output(text) {
                            self.resolve_location_codes(&mut parsed, cancellation).await;
                            let mut itineraries = parsed.itineraries;
                            if itineraries.is_empty() {
                                warn!(turn, "planner emitted an empty itineraries array");
                                return Ok(PlanResult::Clarification {
                                    question: text.to_string(),
                                });
                            }
                            let itinerary = itineraries.remove(0);
                            return Ok(PlanResult::Proposal {
                                itinerary,
                                alternatives: itineraries,
                                reasoning: parsed.reasoning,
                            });
                        }
                        // Not a tool call, and not valid JSON output either — give the
                        // model one more turn to either call a tool or emit the document.
                        continue;
                    }
                }
            }
        }

        warn!(max_turns = self.config.max_turns, "planner turn cap reached without a final proposal");
        let question = if last_text.is_empty() {
            "I wasn't able to put together a proposal from that — could you rephrase your trip request?".to_string()
        } else {
            last_text
        };
        Ok(PlanResult::Clarification { question })
    }

    fn extract_tool_call(content: &Content) -> Option<(String, String, serde_json::Value)> {
        match content {
            Content::ToolCall { id, name, arguments } => Some((id.clone(), name.clone(), arguments.clone())),
            Content::MultiPart { parts } => parts.iter().find_map(Self::extract_tool_call),
            _ => None,
        }
    }

    async fn execute_capability(&self, name: &str, arguments: serde_json::Value) -> Result<ToolOutput, String> {
        let capability = self
            .capabilities
            .get(name)
            .ok_or_else(|| format!("capability '{name}' not found in registry"))?;
        (capability.executor)(arguments).await
    }

    /// Accept either bare JSON or JSON inside a fenced code block; strip the
    /// fence and parse. Unknown fields are discarded for forward compatibility
    /// (serde's default behavior for structs without `deny_unknown_fields`).
    fn try_parse_output(text: &str) -> Option<PlannerOutput> {
        let candidate = extract_json_block(text);
        serde_json::from_str::<PlannerOutput>(&candidate).ok()
    }

    /// Walk every stay's location whose `city_code` looks like a
    /// human-readable name rather than a code, and resolve each in parallel
    /// via the `location` capability under a per-lookup timeout. Failures
    /// are swallowed — a failed code resolution never fails the plan.
    async fn resolve_location_codes(&self, output: &mut PlannerOutput, cancellation: &CancellationToken) {
        let Some(location_cap) = self.capabilities.get("location") else {
            return;
        };

        // Collect (itinerary_index, node_index) pairs whose location looks
        // unresolved, then resolve concurrently.
        let mut lookups = Vec::new();
        for (i_idx, itin) in output.itineraries.iter().enumerate() {
            for (n_idx, node) in itin.graph.nodes.iter().enumerate() {
                if looks_like_name(&node.location.city_code) {
                    lookups.push((i_idx, n_idx, node.location.city_code.clone()));
                }
            }
        }
        if lookups.is_empty() {
            return;
        }

        let timeout = std::time::Duration::from_secs(self.location_config.lookup_timeout_secs);
        let futures = lookups.iter().map(|(_, _, keyword)| {
            let keyword = keyword.clone();
            async move {
                if cancellation.is_cancelled() {
                    return None;
                }
                tokio::time::timeout(timeout, (location_cap.executor)(serde_json::json!({ "query": keyword })))
                    .await
                    .ok()
                    .and_then(|r| r.ok())
            }
        });
        let resolved = join_all(futures).await;

        for ((i_idx, n_idx, _), result) in lookups.into_iter().zip(resolved) {
            let Some(output_tool) = result else { continue };
            let Ok(candidates) = serde_json::from_str::<Vec<crate::itinerary::Location>>(&output_tool.content) else {
                continue;
            };
            let Some(best) = candidates.into_iter().next() else { continue };
            if let Some(node) = output.itineraries[i_idx].graph.nodes.get_mut(n_idx) {
                node.location.enrich_from(&best);
                if !best.iata_codes.is_empty() {
                    node.location.city_code = best.iata_codes[0].clone();
                }
            }
        }
    }
}

/// Heuristic: a code longer than 3 characters or not fully upper-case is
/// probably a human-readable place name, not an IATA/city code.
fn looks_like_name(s: &str) -> bool {
    !s.is_empty() && (s.len() > 3 || s.chars().any(|c| c.is_alphabetic() && !c.is_uppercase()))
}

/// Strip a fenced code block (```json ... ``` or ``` ... ```) if present,
/// otherwise return the text trimmed.
fn extract_json_block(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.trim_start_matches('\n');
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}
