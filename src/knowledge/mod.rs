//! Knowledge store and ingestion pipeline.
//!
//! Chunks of the FAQ document are persisted with their embeddings in SQLite;
//! retrieval embeds the query with the same configured model and ranks
//! chunks by cosine similarity in process.

mod binary;
mod ingest;
mod store;

pub use binary::{decode_embedding, encode_embedding};
pub use ingest::{split_sections, IngestOutcome, KnowledgeIngestor, Section, SECTION_DELIMITER};
pub use store::{cosine_similarity, ChunkRecord, KnowledgeStore, ScoredChunk};
