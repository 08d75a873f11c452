//! Retrieval-augmented chat session.
//!
//! One session per document: a retriever bound to the document's vector
//! collection plus the conversation so far. Each turn retrieves the top
//! chunks for the new message, grounds a prompt in them and the prior
//! history, generates once, and records the turn.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use super::store::{collection_name, SearchHit, VectorStore};

/// Number of chunks retrieved per turn.
pub const RETRIEVAL_TOP_K: usize = 5;

/// One supporting passage behind an answer.
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub page: Option<u32>,
    pub doc_id: String,
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<Evidence>,
}

pub struct ChatSession {
    doc_id: String,
    collection: String,
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    embedding_model: String,
    history: Mutex<Vec<ChatMessage>>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("doc_id", &self.doc_id)
            .field("collection", &self.collection)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    pub(crate) fn new(
        doc_id: String,
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        chat_model: String,
        embedding_model: String,
    ) -> Self {
        let collection = collection_name(&doc_id);
        Self {
            doc_id,
            collection,
            store,
            provider,
            chat_model,
            embedding_model,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Answer one user turn.
    ///
    /// The history lock is held across retrieve, generate, and append: one
    /// turn at a time per session, so interleaved calls cannot corrupt the
    /// history ordering.
    pub async fn chat(&self, message: &str) -> Result<ChatReply, ApiError> {
        let mut history = self.history.lock().await;

        let query = self
            .provider
            .embed(&[message.to_string()], &self.embedding_model)
            .await?;
        let query = query.into_iter().next().ok_or_else(|| {
            ApiError::Upstream("embedding model returned no vector for the query".to_string())
        })?;

        let hits = self
            .store
            .search(&self.collection, &query, RETRIEVAL_TOP_K)
            .await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(grounding_prompt(&hits)));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(message));

        let answer = self
            .provider
            .chat(ChatRequest::new(messages), &self.chat_model)
            .await?;

        history.push(ChatMessage::user(message));
        history.push(ChatMessage::assistant(answer.clone()));

        let sources = hits
            .into_iter()
            .map(|hit| Evidence {
                page: Some(hit.record.page),
                doc_id: hit.record.doc_id,
                score: hit.score,
            })
            .collect();

        Ok(ChatReply { answer, sources })
    }

    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }
}

/// System prompt with the retrieved passages as numbered context blocks.
/// With no hits (empty or never-populated collection) the model still runs,
/// grounded only on the conversation.
fn grounding_prompt(hits: &[SearchHit]) -> String {
    let mut prompt = String::from(
        "You answer questions about one uploaded lecture document. \
         Ground your answers in the context passages when they are relevant, \
         and say so when they are not.",
    );

    if !hits.is_empty() {
        prompt.push_str("\n\nContext:\n");
        for (i, hit) in hits.iter().enumerate() {
            match hit.score {
                Some(score) => prompt.push_str(&format!(
                    "[{}] (page {}, relevance {:.2})\n{}\n\n",
                    i + 1,
                    hit.record.page,
                    score,
                    hit.record.text
                )),
                None => prompt.push_str(&format!(
                    "[{}] (page {})\n{}\n\n",
                    i + 1,
                    hit.record.page,
                    hit.record.text
                )),
            }
        }
    }

    prompt.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::sqlite::SqliteVectorStore;
    use crate::rag::store::ChunkRecord;
    use crate::rag::testing::MockProvider;

    async fn session_over(
        chunks: Vec<(ChunkRecord, Vec<f32>)>,
        provider: Arc<MockProvider>,
    ) -> ChatSession {
        let tmp = std::env::temp_dir().join(format!(
            "lectern-session-test-{}.db",
            uuid::Uuid::new_v4()
        ));
        let store = Arc::new(SqliteVectorStore::with_path(tmp).await.unwrap());
        store.create_collection(&collection_name("doc-1")).await.unwrap();
        store
            .insert(&collection_name("doc-1"), chunks)
            .await
            .unwrap();

        ChatSession::new(
            "doc-1".to_string(),
            store,
            provider,
            "chat-test".to_string(),
            "embed-test".to_string(),
        )
    }

    fn chunk(id: &str, text: &str, page: u32) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.to_string(),
            text: text.to_string(),
            doc_id: "doc-1".to_string(),
            filename: "lecture.pdf".to_string(),
            page,
        }
    }

    #[tokio::test]
    async fn second_turn_prompt_carries_first_turn() {
        let provider = Arc::new(MockProvider::new("cats are mammals, per page 0"));
        let session = session_over(
            vec![(chunk("c1", "cats are mammals", 0), vec![1.0, 0.0])],
            provider.clone(),
        )
        .await;

        let first = session.chat("what are cats?").await.unwrap();
        assert_eq!(first.answer, "cats are mammals, per page 0");
        assert_eq!(session.history_len().await, 2);

        session.chat("are you sure?").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let second_prompt = &requests[1];
        let roles_and_text: Vec<(String, String)> = second_prompt
            .messages
            .iter()
            .map(|m| (m.role.clone(), m.content.clone()))
            .collect();

        // Prior user turn and its answer both appear before the new message.
        assert!(roles_and_text
            .iter()
            .any(|(role, text)| role == "user" && text == "what are cats?"));
        assert!(roles_and_text
            .iter()
            .any(|(role, text)| role == "assistant" && text == "cats are mammals, per page 0"));
        assert_eq!(
            roles_and_text.last().unwrap(),
            &("user".to_string(), "are you sure?".to_string())
        );
    }

    #[tokio::test]
    async fn sources_follow_retrieval_rank() {
        let provider =
            Arc::new(MockProvider::new("answer").with_query_embedding(vec![0.1, 1.0]));
        let session = session_over(
            vec![
                (chunk("c1", "page zero text", 0), vec![1.0, 0.0]),
                (chunk("c2", "page one text", 1), vec![0.0, 1.0]),
            ],
            provider,
        )
        .await;

        let reply = session.chat("about page one").await.unwrap();
        assert_eq!(reply.sources.len(), 2);
        assert_eq!(reply.sources[0].page, Some(1));
        assert_eq!(reply.sources[0].doc_id, "doc-1");
        assert!(reply.sources[0].score.unwrap() >= reply.sources[1].score.unwrap());
    }

    #[tokio::test]
    async fn empty_collection_still_answers_from_history() {
        let provider = Arc::new(MockProvider::new("no idea, nothing indexed"));
        let session = session_over(Vec::new(), provider.clone()).await;

        let reply = session.chat("anything?").await.unwrap();
        assert_eq!(reply.answer, "no idea, nothing indexed");
        assert!(reply.sources.is_empty());

        // The grounded prompt has no context block.
        let requests = provider.requests();
        assert!(!requests[0].messages[0].content.contains("Context:"));
    }
}
