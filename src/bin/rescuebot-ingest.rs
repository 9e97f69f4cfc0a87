//! Ingestion CLI: split the FAQ source document into chunks, embed them,
//! and upsert them into the knowledge store.
//!
//! Re-running on an unchanged document is idempotent (same ids, same text).

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use rescuebot::config::AppConfig;
use rescuebot::error::ChatError;
use rescuebot::knowledge::{IngestOutcome, KnowledgeIngestor, KnowledgeStore};
use rescuebot::providers::OpenAiCompatibleProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = AppConfig::load(&config_path(&args))?;

    // Optional positional argument overrides the configured source document.
    let source = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--") && Some(a.as_str()) != config_flag_value(&args))
        .cloned()
        .unwrap_or_else(|| config.knowledge.source_path.clone());

    let document = std::fs::read_to_string(&source)
        .map_err(|e| anyhow::anyhow!("Cannot read source document '{}': {}", source, e))?;

    let store = Arc::new(KnowledgeStore::open(&config.knowledge.db_path).await?);
    let embedder = Arc::new(
        OpenAiCompatibleProvider::new(&config.provider.base_url, &config.provider.api_key)
            .map_err(ChatError::Configuration)?,
    );

    let ingestor = KnowledgeIngestor::new(
        store,
        embedder,
        config.provider.embedding_model.clone(),
    );

    match ingestor.ingest(&document).await? {
        IngestOutcome::Ingested(count) => {
            println!(
                "Successfully loaded {} chunks from '{}' into {}",
                count, source, config.knowledge.db_path
            );
        }
        IngestOutcome::NoValidContent => {
            println!("No valid content found to ingest in '{}'.", source);
        }
    }

    Ok(())
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

fn config_flag_value(args: &[String]) -> Option<&str> {
    let pos = args.iter().position(|a| a == "--config")?;
    args.get(pos + 1).map(|s| s.as_str())
}
