//! Bridge to the tool-execution process.
//!
//! Exactly one session is held process-wide: `ToolBridge` is constructed at
//! startup, `connect()`ed once, and shut down once. All chat turns serialize
//! through this session; there is no pooling or multiplexing. Concurrent
//! callers rely on the JSON-RPC id matching inside [`McpClient`].

mod client;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::ToolServerConfig;
use crate::error::ChatError;
use crate::traits::{ToolDefinition, ToolSession};

pub use client::McpClient;

/// Holder of the single tool-server session.
///
/// Before `connect()` (or after `shutdown()`), every operation fails fast
/// with [`ChatError::ServiceNotReady`] rather than blocking.
pub struct ToolBridge {
    session: RwLock<Option<Arc<McpClient>>>,
}

impl ToolBridge {
    pub fn new() -> Self {
        Self {
            session: RwLock::new(None),
        }
    }

    /// Spawn the tool-server process and establish the session.
    pub async fn connect(&self, config: &ToolServerConfig) -> anyhow::Result<()> {
        let client = McpClient::spawn(&config.command, &config.args).await?;
        info!(command = %config.command, "Tool server session established");
        *self.session.write().await = Some(Arc::new(client));
        Ok(())
    }

    /// Tear the session down and kill the tool-server process.
    pub async fn shutdown(&self) {
        if let Some(client) = self.session.write().await.take() {
            info!("Shutting down tool server session");
            client.shutdown().await;
        }
    }

    async fn session(&self) -> Result<Arc<McpClient>, ChatError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(ChatError::ServiceNotReady)
    }
}

impl Default for ToolBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolSession for ToolBridge {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        let client = self.session().await?;
        client
            .list_tools()
            .await
            .map_err(|e| ChatError::ToolExecution {
                tool: "tools/list".to_string(),
                cause: e,
            })
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, ChatError> {
        let client = self.session().await?;
        client
            .call_tool(name, arguments)
            .await
            .map_err(|e| ChatError::ToolExecution {
                tool: name.to_string(),
                cause: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_tools_before_connect_fails_fast() {
        let bridge = ToolBridge::new();
        let err = bridge.list_tools().await.unwrap_err();
        assert!(matches!(err, ChatError::ServiceNotReady));
    }

    #[tokio::test]
    async fn call_tool_before_connect_fails_fast() {
        let bridge = ToolBridge::new();
        let err = bridge
            .call_tool("search_faq_knowledge_base", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ServiceNotReady));
    }

    #[tokio::test]
    async fn shutdown_without_session_is_a_noop() {
        let bridge = ToolBridge::new();
        bridge.shutdown().await;
        assert!(matches!(
            bridge.list_tools().await.unwrap_err(),
            ChatError::ServiceNotReady
        ));
    }
}
