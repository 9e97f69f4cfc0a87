use std::sync::Arc;

use tracing::info;

use crate::knowledge::store::{ChunkRecord, KnowledgeStore};
use crate::traits::EmbeddingProvider;

/// Marker string separating sections in the source document.
pub const SECTION_DELIMITER: &str = "###";

/// A section of the source document destined for the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub content: String,
}

/// Result of an ingestion run. Finding no valid content is a distinct
/// successful outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested(usize),
    NoValidContent,
}

/// Split a document on [`SECTION_DELIMITER`], trim each section, and drop
/// empty ones.
///
/// Ids come from the section's position in the raw, unfiltered split
/// (`chunk_<index>`), so they stay stable under edits that only change other
/// sections' text — but shift if sections are inserted or removed, in which
/// case a later upsert can overwrite an unrelated chunk.
pub fn split_sections(document: &str) -> Vec<Section> {
    document
        .split(SECTION_DELIMITER)
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = raw.trim();
            if text.is_empty() {
                None
            } else {
                Some(Section {
                    id: format!("chunk_{}", i),
                    content: text.to_string(),
                })
            }
        })
        .collect()
}

/// Populates the knowledge store from a flat source document.
pub struct KnowledgeIngestor {
    store: Arc<KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_model: String,
}

impl KnowledgeIngestor {
    pub fn new(
        store: Arc<KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_model: String,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model,
        }
    }

    /// Split, embed, and upsert the document in one batch.
    pub async fn ingest(&self, document: &str) -> anyhow::Result<IngestOutcome> {
        let sections = split_sections(document);
        if sections.is_empty() {
            return Ok(IngestOutcome::NoValidContent);
        }

        let texts: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&self.embedding_model, &texts)
            .await?;
        if vectors.len() != sections.len() {
            anyhow::bail!(
                "Embedding count mismatch: {} vectors for {} sections",
                vectors.len(),
                sections.len()
            );
        }

        let records: Vec<ChunkRecord> = sections
            .into_iter()
            .zip(vectors)
            .map(|(section, embedding)| ChunkRecord {
                id: section.id,
                content: section.content,
                embedding,
            })
            .collect();

        self.store.upsert_chunks(&records).await?;
        info!(count = records.len(), "Ingested knowledge chunks");
        Ok(IngestOutcome::Ingested(records.len()))
    }
}
