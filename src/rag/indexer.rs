//! Document indexer.
//!
//! Runs once per uploaded document: turns extracted pages into chunks,
//! embeds them, and populates the document's vector collection.

use std::sync::Arc;

use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::extract::ExtractedDocument;
use crate::llm::LlmProvider;
use super::store::{collection_name, ChunkRecord, VectorStore};

pub struct DocumentIndexer {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LlmProvider>,
    embedding_model: String,
}

impl DocumentIndexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        embedding_model: String,
    ) -> Self {
        Self {
            store,
            provider,
            embedding_model,
        }
    }

    /// Index one extracted document. Returns the number of chunks written.
    ///
    /// Whitespace-only pages are dropped before embedding. A document with
    /// zero non-empty pages still gets its (empty) collection, so later
    /// chats degrade to ungrounded answers instead of failing.
    pub async fn index(
        &self,
        doc: &ExtractedDocument,
        doc_id: &str,
        filename: &str,
    ) -> Result<usize, ApiError> {
        let collection = collection_name(doc_id);
        self.store.create_collection(&collection).await?;

        let records: Vec<ChunkRecord> = doc
            .pages
            .iter()
            .filter_map(|page| {
                let text = page.text.trim();
                if text.is_empty() {
                    return None;
                }
                Some(ChunkRecord {
                    chunk_id: Uuid::new_v4().to_string(),
                    text: text.to_string(),
                    doc_id: doc_id.to_string(),
                    filename: filename.to_string(),
                    page: page.index,
                })
            })
            .collect();

        if records.is_empty() {
            tracing::info!("Document {} has no text pages; collection left empty", doc_id);
            return Ok(0);
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self
            .provider
            .embed(&texts, &self.embedding_model)
            .await?;

        if embeddings.len() != records.len() {
            return Err(ApiError::Upstream(format!(
                "embedding model returned {} vectors for {} chunks",
                embeddings.len(),
                records.len()
            )));
        }

        let rows: Vec<(ChunkRecord, Vec<f32>)> =
            records.into_iter().zip(embeddings).collect();
        let written = rows.len();
        self.store.insert(&collection, rows).await?;

        tracing::info!("Indexed {} chunks for document {}", written, doc_id);
        Ok(written)
    }
}
