//! Test infrastructure: MockProvider, MockEmbedder, and MockToolSession.
//!
//! Scripted doubles for the provider and tool-session seams, so orchestration
//! tests can assert call counts and transcript shapes without a network or a
//! child process.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::ChatError;
use crate::providers::ProviderError;
use crate::traits::{
    EmbeddingProvider, ModelProvider, ProviderResponse, ToolCall, ToolDefinition, ToolSession,
};

static MOCK_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// A recorded call to `MockProvider::chat()`.
#[derive(Debug, Clone)]
pub struct MockChatCall {
    pub model: String,
    pub messages: Vec<Value>,
    pub tools: Vec<Value>,
}

/// Mock LLM provider that returns scripted responses in FIFO order.
pub struct MockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    errors: Mutex<Vec<ProviderError>>,
    pub call_log: Mutex<Vec<MockChatCall>>,
}

impl MockProvider {
    /// A provider that always returns "Mock response".
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// A provider with a FIFO queue of scripted responses.
    pub fn with_responses(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            errors: Mutex::new(Vec::new()),
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Queue one failure to be returned before any scripted response.
    pub fn failing_first(mut self, error: ProviderError) -> Self {
        self.errors.get_mut().push(error);
        self
    }

    /// Helper: build a text-only response.
    pub fn text_response(text: &str) -> ProviderResponse {
        ProviderResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
        }
    }

    /// Helper: build a single-tool-call response with a fresh call id.
    pub fn tool_call_response(tool_name: &str, args: &str) -> ProviderResponse {
        ProviderResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: format!("call_{}", MOCK_CALL_ID.fetch_add(1, Ordering::SeqCst)),
                name: tool_name.to_string(),
                arguments: args.to_string(),
            }],
        }
    }

    /// How many times `chat()` was called.
    pub async fn call_count(&self) -> usize {
        self.call_log.lock().await.len()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[Value],
        tools: &[Value],
    ) -> anyhow::Result<ProviderResponse> {
        self.call_log.lock().await.push(MockChatCall {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        let mut errors = self.errors.lock().await;
        if !errors.is_empty() {
            return Err(errors.remove(0).into());
        }
        drop(errors);

        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            Ok(Self::text_response("Mock response"))
        } else {
            Ok(responses.remove(0))
        }
    }
}

/// Deterministic embedder: identical text maps to identical vectors, so
/// retrieval ordering is reproducible without a provider.
pub struct MockEmbedder;

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, _model: &str, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vec = vec![0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            vec[(i + byte as usize) % 8] += byte as f32 / 255.0;
        }
        vec[text.len() % 8] += 1.0;
        Ok(vec)
    }

    async fn embed_batch(&self, model: &str, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(model, text).await?);
        }
        Ok(vectors)
    }
}

/// Scripted tool session recording every `call_tool` invocation.
pub struct MockToolSession {
    definitions: Vec<ToolDefinition>,
    result: String,
    failure: Option<String>,
    ready: bool,
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl MockToolSession {
    /// A ready session advertising the retrieval tool.
    pub fn ready() -> Self {
        Self {
            definitions: vec![ToolDefinition {
                name: "search_faq_knowledge_base".to_string(),
                description: "Search the FAQ database.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"],
                }),
            }],
            result: "mock tool result".to_string(),
            failure: None,
            ready: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A session with no connection: everything fails with ServiceNotReady.
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::ready()
        }
    }

    pub fn with_result(mut self, result: &str) -> Self {
        self.result = result.to_string();
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

#[async_trait]
impl ToolSession for MockToolSession {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        if !self.ready {
            return Err(ChatError::ServiceNotReady);
        }
        Ok(self.definitions.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ChatError> {
        if !self.ready {
            return Err(ChatError::ServiceNotReady);
        }
        self.calls
            .lock()
            .await
            .push((name.to_string(), arguments));
        if let Some(message) = &self.failure {
            return Err(ChatError::ToolExecution {
                tool: name.to_string(),
                cause: anyhow::anyhow!("{}", message),
            });
        }
        Ok(self.result.clone())
    }
}
