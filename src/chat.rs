//! Chat orchestration: one (history, message) pair in, one reply out.
//!
//! A turn is a linear state machine with no backtracking: build the prompt,
//! fetch the live tool catalog, first completion, optionally execute the
//! first requested tool call, second completion without tools. The second
//! call carries no tool schema, which caps every turn at exactly one tool
//! round-trip.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::conversation::{bound_history, HistoryEntry};
use crate::error::ChatError;
use crate::providers::ProviderError;
use crate::traits::{ChatMessage, ModelProvider, ProviderResponse, ToolDefinition, ToolSession};

/// Persona, topical scope, default refusal, and the retrieval mandate.
const SYSTEM_PROMPT: &str = "You are RescueBot, the dedicated AI assistant for a Food Rescue App. \
    Follow these rules strictly:\n\
    1. IDENTITY: If asked who you are or if you are a bot, reply: \
    'I am RescueBot, here to help you rescue surplus food!'\n\
    2. SCOPE: You ONLY answer questions about food rescue, app policies, pickups, and refunds. \
    Do NOT answer general questions like math, history, or coding.\n\
    3. DEFAULT REPLY: If a user asks a question unrelated to food rescue, reply: \
    'I am sorry, I can only assist with questions related to the Food Rescue App.'\n\
    4. KNOWLEDGE: Always use the 'search_faq_knowledge_base' tool to find answers. \
    If the tool returns no results, admit you do not know.";

/// Bounded retry count for completion calls (retryable failures only).
const MAX_COMPLETION_RETRIES: u32 = 2;

/// Base backoff between completion retries; grows linearly per attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// One chat turn as supplied by the caller. The history is owned by the
/// caller and passed in full on every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: Option<String>,
}

/// The chat orchestrator. Stateless across turns: the only shared resource
/// is the tool session handed in at construction.
pub struct ChatService {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<dyn ToolSession>,
    model: String,
}

impl ChatService {
    pub fn new(provider: Arc<dyn ModelProvider>, tools: Arc<dyn ToolSession>, model: String) -> Self {
        Self {
            provider,
            tools,
            model,
        }
    }

    /// Run one chat turn: at most two completion calls and one tool call.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let mut messages: Vec<ChatMessage> = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::System {
            content: SYSTEM_PROMPT.to_string(),
        });
        for entry in bound_history(&request.history) {
            messages.push(entry.to_message());
        }
        messages.push(ChatMessage::User {
            content: request.message.clone(),
        });

        // The catalog is fetched fresh every turn so tool changes are picked
        // up live, and so a missing session fails the turn before any
        // completion tokens are spent.
        let definitions = self.tools.list_tools().await?;
        let tool_schemas: Vec<Value> = definitions.iter().map(function_schema).collect();

        let wire: Vec<Value> = messages.iter().map(ChatMessage::to_wire).collect();
        let first = self.call_model(&wire, &tool_schemas).await?;

        let requested = first.tool_calls.len();
        let mut tool_calls = first.tool_calls.into_iter();
        let Some(call) = tool_calls.next() else {
            return Ok(ChatReply {
                reply: first.content,
            });
        };
        if requested > 1 {
            // Single-step protocol: extra simultaneous calls are dropped,
            // loudly. The assistant message fed back below carries only the
            // executed call so the transcript never references an
            // unanswered call id.
            warn!(
                requested,
                dropped = requested - 1,
                "Model requested multiple tool calls; executing only the first"
            );
        }

        let arguments: Value = serde_json::from_str(&call.arguments).map_err(|e| {
            ChatError::MalformedToolArguments {
                tool: call.name.clone(),
                source: e,
            }
        })?;

        info!(tool = %call.name, id = %call.id, "Executing tool call");
        let result = self.tools.call_tool(&call.name, arguments).await?;

        messages.push(ChatMessage::Assistant {
            content: first.content,
            tool_calls: vec![call.clone()],
        });
        messages.push(ChatMessage::Tool {
            tool_call_id: call.id,
            content: result,
        });

        // Second completion gets no tool schema: it cannot request another
        // tool, capping recursion at one round-trip per turn.
        let wire: Vec<Value> = messages.iter().map(ChatMessage::to_wire).collect();
        let second = self.call_model(&wire, &[]).await?;

        Ok(ChatReply {
            reply: second.content,
        })
    }

    /// Completion call with a bounded retry for retryable provider failures.
    async fn call_model(
        &self,
        messages: &[Value],
        tools: &[Value],
    ) -> Result<ProviderResponse, ChatError> {
        let mut attempt = 0u32;
        loop {
            match self.provider.chat(&self.model, messages, tools).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retryable = e
                        .downcast_ref::<ProviderError>()
                        .map(ProviderError::is_retryable)
                        .unwrap_or(false);
                    if !retryable || attempt >= MAX_COMPLETION_RETRIES {
                        return Err(ChatError::UpstreamModel { cause: e });
                    }
                    attempt += 1;
                    warn!(
                        attempt,
                        max = MAX_COMPLETION_RETRIES,
                        "Completion call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
            }
        }
    }
}

/// Translate a catalog entry into the LLM's function-calling schema. The
/// parameter schema passes through verbatim.
fn function_schema(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.input_schema,
        },
    })
}
