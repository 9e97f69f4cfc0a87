use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ChatError;

/// A single tool call as returned by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text; requires a validated parse before execution.
    pub arguments: String,
}

/// A message in the conversation fed to the completion endpoint.
///
/// One variant per role, each carrying exactly the fields that role requires,
/// so a tool message without a call id cannot be constructed.
#[derive(Debug, Clone)]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    /// Render the OpenAI chat-completions wire shape for this message.
    pub fn to_wire(&self) -> Value {
        match self {
            ChatMessage::System { content } => json!({
                "role": "system",
                "content": content,
            }),
            ChatMessage::User { content } => json!({
                "role": "user",
                "content": content,
            }),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut msg = json!({
                    "role": "assistant",
                    "content": content,
                });
                if !tool_calls.is_empty() {
                    msg["tool_calls"] = Value::Array(
                        tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {
                                        "name": tc.name,
                                        "arguments": tc.arguments,
                                    },
                                })
                            })
                            .collect(),
                    );
                }
                msg
            }
            ChatMessage::Tool {
                tool_call_id,
                content,
            } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            }),
        }
    }
}

/// A tool as advertised by the tool server's live catalog.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema parameter description, passed through to the LLM verbatim.
    pub input_schema: Value,
}

/// The LLM's response: content text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Model provider — sends messages + tool defs to an LLM, gets back a response.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse>;
}

/// Embedding provider — maps text into the vector space shared by ingestion
/// and retrieval.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, model: &str, text: &str) -> anyhow::Result<Vec<f32>>;

    async fn embed_batch(&self, model: &str, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// A tool hosted by the tool-execution process.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON-schema description of the tool's arguments.
    fn schema(&self) -> Value;
    /// Execute with already-parsed JSON arguments, returning result text.
    async fn call(&self, arguments: &Value) -> anyhow::Result<String>;
}

/// The chat side of the tool session: catalog lookup and single-tool
/// execution over the one process-wide session.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Query the live tool catalog. Fails with `ServiceNotReady` when no
    /// session exists (not yet connected, or shut down).
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError>;

    /// Execute a single named tool and return its textual result.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ChatError>;
}
