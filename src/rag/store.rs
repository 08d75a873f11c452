//! VectorStore trait: abstract interface for per-document vector
//! collections.
//!
//! One collection holds the chunks of one uploaded document. The primary
//! implementation is `SqliteVectorStore` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// The one place the collection-naming transform lives. Index-time and
/// query-time callers must both go through it.
pub fn collection_name(doc_id: &str) -> String {
    format!("lectures_{doc_id}")
}

/// A stored chunk: one page's worth of text with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk identifier.
    pub chunk_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Owning document identifier.
    pub doc_id: String,
    /// Original filename of the uploaded document.
    pub filename: String,
    /// Zero-based page/slide number the chunk came from.
    pub page: u32,
}

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: ChunkRecord,
    /// Relevance in [0, 1]; None when the backing store supplies no score.
    pub score: Option<f32>,
}

/// Abstract trait for vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet (index path).
    async fn create_collection(&self, name: &str) -> Result<(), ApiError>;

    /// Fail with NotFound if the collection was never created (chat path).
    async fn open_collection(&self, name: &str) -> Result<(), ApiError>;

    /// Insert chunks with their embedding vectors.
    async fn insert(
        &self,
        collection: &str,
        rows: Vec<(ChunkRecord, Vec<f32>)>,
    ) -> Result<(), ApiError>;

    /// Top-k chunks by similarity to the query embedding, best first.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, ApiError>;

    /// Number of chunks in the collection.
    async fn count(&self, collection: &str) -> Result<usize, ApiError>;
}
