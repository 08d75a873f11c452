//! End-to-end flow over the public API: index a document, chat against it,
//! and check session identity guarantees.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lectern_backend::core::errors::ApiError;
use lectern_backend::extract::{ExtractedDocument, Page};
use lectern_backend::llm::{ChatRequest, LlmProvider};
use lectern_backend::rag::{
    collection_name, DocumentIndexer, SessionRegistry, SqliteVectorStore, VectorStore,
};

struct CannedProvider {
    reply: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl CannedProvider {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.reply.clone())
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

async fn fresh_store() -> Arc<SqliteVectorStore> {
    let db_path = std::env::temp_dir().join(format!(
        "lectern-chat-flow-{}.db",
        uuid::Uuid::new_v4()
    ));
    Arc::new(SqliteVectorStore::with_path(db_path).await.unwrap())
}

fn two_page_doc() -> ExtractedDocument {
    ExtractedDocument {
        pages: vec![
            Page {
                index: 0,
                text: "cats are mammals".to_string(),
            },
            Page {
                index: 1,
                text: String::new(),
            },
        ],
        ..Default::default()
    }
}

#[tokio::test]
async fn index_then_chat_cites_the_indexed_page() {
    let store = fresh_store().await;
    let provider = Arc::new(CannedProvider::new("Cats are mammals."));

    let indexer = DocumentIndexer::new(store.clone(), provider.clone(), "embed-test".into());
    let indexed = indexer
        .index(&two_page_doc(), "doc-cats", "cats.pdf")
        .await
        .unwrap();

    // Only the non-empty page is indexed.
    assert_eq!(indexed, 1);
    assert_eq!(store.count(&collection_name("doc-cats")).await.unwrap(), 1);

    let registry = SessionRegistry::new(
        store,
        provider,
        "chat-test".into(),
        "embed-test".into(),
        8,
    );
    let session = registry.get_or_create("doc-cats").await.unwrap();
    let reply = session.chat("what are cats?").await.unwrap();

    assert_eq!(reply.answer, "Cats are mammals.");
    assert_eq!(reply.sources.len(), 1);
    assert_eq!(reply.sources[0].page, Some(0));
    assert_eq!(reply.sources[0].doc_id, "doc-cats");
    assert!(reply.sources[0].score.is_some());
}

#[tokio::test]
async fn chat_without_upload_fails_as_not_found() {
    let store = fresh_store().await;
    let registry = SessionRegistry::new(
        store,
        Arc::new(CannedProvider::new("unused")),
        "chat-test".into(),
        "embed-test".into(),
        8,
    );

    let err = registry.get_or_create("missing-doc").await.unwrap_err();
    match err {
        ApiError::NotFound(msg) => assert!(msg.contains("missing-doc")),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_first_chats_build_one_session() {
    let store = fresh_store().await;
    let provider = Arc::new(CannedProvider::new("answer"));

    let indexer = DocumentIndexer::new(store.clone(), provider.clone(), "embed-test".into());
    indexer
        .index(&two_page_doc(), "doc-race", "race.pdf")
        .await
        .unwrap();

    let registry = Arc::new(SessionRegistry::new(
        store,
        provider,
        "chat-test".into(),
        "embed-test".into(),
        8,
    ));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry.get_or_create("doc-race").await.unwrap()
        }));
    }

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap());
    }

    assert_eq!(registry.sessions_created(), 1);
    for session in &sessions[1..] {
        assert!(Arc::ptr_eq(&sessions[0], session));
    }
}

#[tokio::test]
async fn history_survives_between_turns_of_one_document() {
    let store = fresh_store().await;
    let provider = Arc::new(CannedProvider::new("first answer"));

    let indexer = DocumentIndexer::new(store.clone(), provider.clone(), "embed-test".into());
    indexer
        .index(&two_page_doc(), "doc-memory", "memory.pdf")
        .await
        .unwrap();

    let registry = SessionRegistry::new(
        store,
        provider.clone(),
        "chat-test".into(),
        "embed-test".into(),
        8,
    );

    let session = registry.get_or_create("doc-memory").await.unwrap();
    session.chat("first question").await.unwrap();

    // Re-fetch through the registry: same session, same memory.
    let again = registry.get_or_create("doc-memory").await.unwrap();
    again.chat("second question").await.unwrap();

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let second_prompt = &requests[1];
    let contents: Vec<&str> = second_prompt
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert!(contents.contains(&"first question"));
    assert!(contents.contains(&"first answer"));
}
