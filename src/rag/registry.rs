//! Session registry.
//!
//! Process-wide authority for chat-session identity: at most one live
//! session per document at any instant, created lazily on the first chat
//! for that document and reused (with its accumulated history) afterward.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

use crate::core::errors::ApiError;
use crate::llm::LlmProvider;
use super::session::ChatSession;
use super::store::{collection_name, VectorStore};

pub struct SessionRegistry {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    embedding_model: String,
    sessions: Mutex<LruCache<String, Arc<ChatSession>>>,
    created: AtomicU64,
}

impl SessionRegistry {
    /// `capacity` bounds the number of live sessions; the least recently
    /// used one is evicted when a new document would exceed it. An evicted
    /// idle session loses its in-memory history, matching the
    /// process-lifetime-only durability of session memory.
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        chat_model: String,
        embedding_model: String,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            provider,
            chat_model,
            embedding_model,
            sessions: Mutex::new(LruCache::new(capacity)),
            created: AtomicU64::new(0),
        }
    }

    /// Return the live session for `doc_id`, creating it if absent.
    ///
    /// The registry lock spans lookup, the collection-existence check, and
    /// insertion: concurrent first requests for one never-seen `doc_id`
    /// construct exactly one session, and the losers receive that same
    /// instance.
    pub async fn get_or_create(&self, doc_id: &str) -> Result<Arc<ChatSession>, ApiError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get(doc_id) {
            return Ok(session.clone());
        }

        match self.store.open_collection(&collection_name(doc_id)).await {
            Ok(()) => {}
            Err(ApiError::NotFound(_)) => return Err(ApiError::not_indexed(doc_id)),
            Err(err) => return Err(err),
        }

        let session = Arc::new(ChatSession::new(
            doc_id.to_string(),
            self.store.clone(),
            self.provider.clone(),
            self.chat_model.clone(),
            self.embedding_model.clone(),
        ));
        self.created.fetch_add(1, Ordering::Relaxed);
        sessions.put(doc_id.to_string(), session.clone());

        tracing::debug!("Created chat session for document {}", doc_id);
        Ok(session)
    }

    /// Number of sessions currently held.
    pub async fn live_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Total sessions constructed since startup.
    pub fn sessions_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}
