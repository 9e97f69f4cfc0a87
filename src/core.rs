use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::chat::{ChatRequest, ChatService};
use crate::config::AppConfig;
use crate::conversation::HistoryEntry;
use crate::error::ChatError;
use crate::mcp::ToolBridge;
use crate::providers::OpenAiCompatibleProvider;
use crate::traits::{ModelProvider, ToolSession};

/// Wire the service together and run the interactive chat loop.
///
/// The tool bridge is the one shared resource: a single session established
/// here, passed into the service by reference, and torn down on exit —
/// including on ctrl-c.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Provider (completion + embedding, one credential)
    let provider: Arc<dyn ModelProvider> = Arc::new(
        OpenAiCompatibleProvider::new(&config.provider.base_url, &config.provider.api_key)
            .map_err(ChatError::Configuration)?,
    );
    info!(
        base_url = %config.provider.base_url,
        model = %config.provider.chat_model,
        "Provider configured"
    );

    // 2. Tool bridge — exactly one session for the life of the process
    let bridge = Arc::new(ToolBridge::new());
    info!(command = %config.tool_server.command, "Starting tool server");
    bridge.connect(&config.tool_server).await?;

    // 3. Chat service
    let tools: Arc<dyn ToolSession> = bridge.clone();
    let service = ChatService::new(provider, tools, config.provider.chat_model.clone());

    let result = chat_loop(&service).await;

    bridge.shutdown().await;
    result
}

/// Interactive loop on stdin. The loop is the caller: it owns the history
/// and passes it in full on every turn; the service keeps no session state.
async fn chat_loop(service: &ChatService) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut history: Vec<HistoryEntry> = Vec::new();

    stdout
        .write_all(b"RescueBot is ready. Type 'quit' to exit.\n")
        .await?;

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            // stdin closed
            return Ok(());
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("quit") || message.eq_ignore_ascii_case("exit") {
            return Ok(());
        }

        let request = ChatRequest {
            message: message.to_string(),
            history: history.clone(),
        };

        match service.chat(&request).await {
            Ok(reply) => {
                let text = reply.reply.unwrap_or_default();
                stdout
                    .write_all(format!("RescueBot: {}\n", text).as_bytes())
                    .await?;
                history.push(HistoryEntry::user(message));
                history.push(HistoryEntry::assistant(text));
            }
            Err(ChatError::ServiceNotReady) => {
                stdout
                    .write_all(b"RescueBot is still starting up, please retry shortly.\n")
                    .await?;
            }
            Err(e) => {
                // Generic failure to the user; the cause goes to the log.
                error!("Chat turn failed: {}", e);
                stdout
                    .write_all(b"Sorry, something went wrong handling that message.\n")
                    .await?;
            }
        }
    }
}
