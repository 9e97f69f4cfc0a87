//! Tools hosted by the tool-execution process.
//!
//! Currently a single tool is exposed: FAQ knowledge-base search.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::knowledge::KnowledgeStore;
use crate::traits::{EmbeddingProvider, Tool};

/// Returned instead of an empty string when the store has no matches, so the
/// model can report the gap rather than hallucinate from blank input.
pub const NO_RESULTS_SENTINEL: &str = "No relevant FAQ information found.";

/// Separator between chunk texts in the tool's result.
const CHUNK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

/// Searches the FAQ knowledge base by embedding similarity.
///
/// The query is embedded with the same configured model used at ingestion
/// time; mixing models silently degrades relevance, so the model name comes
/// from the one shared config value.
pub struct SearchFaqTool {
    store: Arc<KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: String,
    top_k: usize,
}

impl SearchFaqTool {
    pub fn new(
        store: Arc<KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: String,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model,
            top_k,
        }
    }
}

#[async_trait]
impl Tool for SearchFaqTool {
    fn name(&self) -> &str {
        "search_faq_knowledge_base"
    }

    fn description(&self) -> &str {
        "Search the FAQ database for policies, safety guidelines, and general info. \
         Use this tool whenever the user asks about rules, refunds, or how the app works."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text search query against the FAQ knowledge base",
                }
            },
            "required": ["query"],
        })
    }

    async fn call(&self, arguments: &Value) -> anyhow::Result<String> {
        let args: SearchArgs = serde_json::from_value(arguments.clone())
            .map_err(|e| anyhow::anyhow!("Invalid search arguments: {}", e))?;

        info!(query = %args.query, "Searching FAQ knowledge base");

        let query_vec = self
            .embedder
            .embed(&self.embedding_model, &args.query)
            .await?;
        let hits = self.store.search(&query_vec, self.top_k).await?;

        if hits.is_empty() {
            return Ok(NO_RESULTS_SENTINEL.to_string());
        }

        Ok(hits
            .iter()
            .map(|h| h.content.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeIngestor;
    use crate::testing::MockEmbedder;

    async fn tool_with_corpus(document: &str) -> (tempfile::TempDir, SearchFaqTool) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("faq.db");
        let store = Arc::new(
            KnowledgeStore::open(db_path.to_str().unwrap())
                .await
                .unwrap(),
        );
        let embedder = Arc::new(MockEmbedder);
        if !document.is_empty() {
            KnowledgeIngestor::new(store.clone(), embedder.clone(), "test-model".to_string())
                .ingest(document)
                .await
                .unwrap();
        }
        let tool = SearchFaqTool::new(store, embedder, "test-model".to_string(), 3);
        (dir, tool)
    }

    #[tokio::test]
    async fn empty_store_returns_sentinel() {
        let (_dir, tool) = tool_with_corpus("").await;
        let result = tool.call(&json!({"query": "refunds"})).await.unwrap();
        assert_eq!(result, NO_RESULTS_SENTINEL);
    }

    #[tokio::test]
    async fn identical_text_ranks_first() {
        let (_dir, tool) = tool_with_corpus(
            "### Refunds are processed within 24 hours.\n\
             ### Pickups close at 9pm.\n\
             ### Listings expire after three days.",
        )
        .await;
        // MockEmbedder maps identical text to identical vectors, so querying
        // with a stored chunk's text must rank that chunk first.
        let result = tool
            .call(&json!({"query": "Refunds are processed within 24 hours."}))
            .await
            .unwrap();
        assert!(result.starts_with("Refunds are processed within 24 hours."));
    }

    #[tokio::test]
    async fn results_joined_with_blank_line() {
        let (_dir, tool) = tool_with_corpus("### one\n### two\n### three\n### four").await;
        let result = tool.call(&json!({"query": "one"})).await.unwrap();
        // top_k = 3 of 4 chunks
        assert_eq!(result.split("\n\n").count(), 3);
    }

    #[tokio::test]
    async fn missing_query_is_an_error() {
        let (_dir, tool) = tool_with_corpus("### something").await;
        assert!(tool.call(&json!({})).await.is_err());
        assert!(tool.call(&json!({"q": "typo"})).await.is_err());
    }

    #[tokio::test]
    async fn schema_requires_query() {
        let (_dir, tool) = tool_with_corpus("").await;
        let schema = tool.schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"][0], "query");
        assert_eq!(tool.name(), "search_faq_knowledge_base");
        assert!(!tool.description().is_empty());
    }
}
