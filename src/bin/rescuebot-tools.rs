//! The tool-execution process: serves the retrieval tool over stdio.
//!
//! Spawned by the chat daemon's tool bridge. stdout carries the JSON-RPC
//! stream, so all logging is routed to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use rescuebot::config::AppConfig;
use rescuebot::error::ChatError;
use rescuebot::knowledge::KnowledgeStore;
use rescuebot::providers::OpenAiCompatibleProvider;
use rescuebot::tools::SearchFaqTool;
use rescuebot::toolserver::ToolServer;
use rescuebot::traits::Tool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = AppConfig::load(&config_path(&args))?;

    let store = Arc::new(KnowledgeStore::open(&config.knowledge.db_path).await?);
    let embedder = Arc::new(
        OpenAiCompatibleProvider::new(&config.provider.base_url, &config.provider.api_key)
            .map_err(ChatError::Configuration)?,
    );

    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(SearchFaqTool::new(
        store,
        embedder,
        config.provider.embedding_model.clone(),
        config.knowledge.top_k,
    ))];

    ToolServer::new(tools).run().await
}

fn config_path(args: &[String]) -> PathBuf {
    if let Some(pos) = args.iter().position(|a| a == "--config") {
        if let Some(path) = args.get(pos + 1) {
            return PathBuf::from(path);
        }
    }
    std::env::var("RESCUEBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}
