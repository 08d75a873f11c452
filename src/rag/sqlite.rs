//! SQLite-backed vector store implementation.
//!
//! Chunk text and metadata live in SQLite, with serialized embeddings for
//! brute-force cosine similarity search. No external server required;
//! suitable for the per-document collection sizes this backend sees
//! (one row per non-empty page).

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::core::config::AppPaths;
use crate::core::errors::ApiError;
use super::store::{ChunkRecord, SearchHit, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Create a new store at the default location.
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    /// Create with a custom path (for testing).
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                content TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                filename TEXT NOT NULL DEFAULT '',
                page INTEGER NOT NULL,
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Serialize embedding to bytes (little-endian f32).
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let denom = norm_a * norm_b;

        if denom <= f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, ApiError> {
        let row = sqlx::query("SELECT name FROM collections WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(row.is_some())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> ChunkRecord {
        ChunkRecord {
            chunk_id: row.get("chunk_id"),
            text: row.get("content"),
            doc_id: row.get("doc_id"),
            filename: row.get("filename"),
            page: row.get::<i64, _>("page") as u32,
        }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(&self, name: &str) -> Result<(), ApiError> {
        sqlx::query("INSERT OR IGNORE INTO collections (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }

    async fn open_collection(&self, name: &str) -> Result<(), ApiError> {
        if self.collection_exists(name).await? {
            Ok(())
        } else {
            Err(ApiError::NotFound(format!(
                "collection '{name}' does not exist"
            )))
        }
    }

    async fn insert(
        &self,
        collection: &str,
        rows: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), ApiError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (record, embedding) in &rows {
            let blob = Self::serialize_embedding(embedding);
            sqlx::query(
                "INSERT OR REPLACE INTO chunks (chunk_id, collection, content, doc_id, filename, page, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&record.chunk_id)
            .bind(collection)
            .bind(&record.text)
            .bind(&record.doc_id)
            .bind(&record.filename)
            .bind(record.page as i64)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        tracing::debug!("Inserted {} chunks into '{}'", rows.len(), collection);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, ApiError> {
        self.open_collection(collection).await?;

        let rows = sqlx::query(
            "SELECT chunk_id, content, doc_id, filename, page, embedding
             FROM chunks WHERE collection = ?1 ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut scored: Vec<SearchHit> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let score = Self::cosine_similarity(query_embedding, &stored).clamp(0.0, 1.0);

                Some(SearchHit {
                    record: Self::row_to_record(row),
                    score: Some(score),
                })
            })
            .collect();

        // Stable sort over rowid-ordered rows: equal scores keep insertion
        // order, so ties break deterministically.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteVectorStore {
        let tmp = std::env::temp_dir().join(format!(
            "lectern-vectors-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        SqliteVectorStore::with_path(tmp).await.unwrap()
    }

    fn make_record(id: &str, text: &str, page: u32) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.to_string(),
            text: text.to_string(),
            doc_id: "doc-1".to_string(),
            filename: "lecture.pdf".to_string(),
            page,
        }
    }

    #[tokio::test]
    async fn insert_and_search() {
        let store = test_store().await;
        store.create_collection("lectures_doc-1").await.unwrap();

        let embedding = vec![1.0, 0.0, 0.0];
        store
            .insert(
                "lectures_doc-1",
                vec![(make_record("c1", "Hello world", 0), embedding.clone())],
            )
            .await
            .unwrap();
        assert_eq!(store.count("lectures_doc-1").await.unwrap(), 1);

        let hits = store.search("lectures_doc-1", &embedding, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.chunk_id, "c1");
        assert!(hits[0].score.unwrap() > 0.99);
    }

    #[tokio::test]
    async fn ranking_orders_by_similarity() {
        let store = test_store().await;
        store.create_collection("lectures_doc-1").await.unwrap();

        store
            .insert(
                "lectures_doc-1",
                vec![
                    (make_record("a", "chunk A", 0), vec![1.0, 0.0, 0.0]),
                    (make_record("b", "chunk B", 1), vec![0.0, 1.0, 0.0]),
                    (make_record("c", "chunk C", 2), vec![0.0, 0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        // Closest to B, then A, C far behind.
        let query = vec![0.3, 1.0, 0.0];
        let hits = store.search("lectures_doc-1", &query, 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.chunk_id, "b");
        assert_eq!(hits[1].record.chunk_id, "a");
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
    }

    #[tokio::test]
    async fn open_missing_collection_is_not_found() {
        let store = test_store().await;

        let err = store.open_collection("lectures_ghost").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = store.search("lectures_ghost", &[1.0], 5).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_collection_searches_to_nothing() {
        let store = test_store().await;
        store.create_collection("lectures_empty").await.unwrap();

        assert_eq!(store.count("lectures_empty").await.unwrap(), 0);
        let hits = store.search("lectures_empty", &[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn create_collection_is_idempotent() {
        let store = test_store().await;
        store.create_collection("lectures_doc-1").await.unwrap();
        store
            .insert(
                "lectures_doc-1",
                vec![(make_record("c1", "text", 0), vec![1.0])],
            )
            .await
            .unwrap();

        store.create_collection("lectures_doc-1").await.unwrap();
        assert_eq!(store.count("lectures_doc-1").await.unwrap(), 1);
    }

    #[test]
    fn scores_are_clamped_to_unit_interval() {
        let opposite = SqliteVectorStore::cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!(opposite < 0.0);
        assert_eq!(opposite.clamp(0.0, 1.0), 0.0);
    }
}
