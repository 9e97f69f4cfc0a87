use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::knowledge::binary::{decode_embedding, encode_embedding};

/// A chunk ready to persist: id, text, and its embedding.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A retrieval hit, ranked by similarity.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub content: String,
    pub score: f32,
}

/// SQLite-backed chunk store keyed by chunk id.
///
/// Shared read/write: the ingestion path writes offline, the retrieval tool
/// reads online. Upsert is insert-or-overwrite by id, so re-ingestion is
/// idempotent as long as chunk boundaries are unchanged.
pub struct KnowledgeStore {
    pool: SqlitePool,
}

impl KnowledgeStore {
    pub async fn open(db_path: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Upsert a batch of chunks in one transaction.
    pub async fn upsert_chunks(&self, records: &[ChunkRecord]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();
        for record in records {
            sqlx::query(
                "INSERT OR REPLACE INTO chunks (id, content, embedding, updated_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&record.content)
            .bind(encode_embedding(&record.embedding))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Top-k nearest chunks by cosine similarity to the query vector.
    ///
    /// An empty result is a valid outcome, not an error.
    pub async fn search(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        let rows = sqlx::query("SELECT id, content, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<ScoredChunk> = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let blob: Vec<u8> = row.get("embedding");
            match decode_embedding(&blob) {
                Ok(vec) => scored.push(ScoredChunk {
                    score: cosine_similarity(query_vec, &vec),
                    id,
                    content: row.get("content"),
                }),
                Err(e) => {
                    warn!(chunk_id = %id, "Skipping chunk with undecodable embedding: {}", e);
                }
            }
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> anyhow::Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

/// Cosine similarity between two vectors. Returns 0.0 for mismatched
/// dimensions or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, content: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            content: content.to_string(),
            embedding,
        }
    }

    async fn temp_store() -> (tempfile::TempDir, KnowledgeStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = KnowledgeStore::open(db_path.to_str().unwrap())
            .await
            .unwrap();
        (dir, store)
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn upsert_and_search_ranked() {
        let (_dir, store) = temp_store().await;
        store
            .upsert_chunks(&[
                record("chunk_1", "refund policy", vec![1.0, 0.0, 0.0]),
                record("chunk_2", "pickup hours", vec![0.0, 1.0, 0.0]),
                record("chunk_3", "partially related", vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "chunk_1");
        assert_eq!(hits[1].id, "chunk_3");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn search_empty_store_returns_empty() {
        let (_dir, store) = temp_store().await;
        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let (_dir, store) = temp_store().await;
        store
            .upsert_chunks(&[record("chunk_1", "old text", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert_chunks(&[record("chunk_1", "new text", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].content, "new text");
    }

    #[tokio::test]
    async fn search_caps_at_k() {
        let (_dir, store) = temp_store().await;
        let records: Vec<ChunkRecord> = (0..10)
            .map(|i| record(&format!("chunk_{}", i), "text", vec![1.0, i as f32]))
            .collect();
        store.upsert_chunks(&records).await.unwrap();

        let hits = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }
}
