//! RAG session engine.
//!
//! - `DocumentIndexer`: pages in, per-document vector collection out
//! - `VectorStore` / `SqliteVectorStore`: durable similarity search
//! - `SessionRegistry`: one live chat session per document
//! - `ChatSession`: retrieve, ground, generate, remember

mod indexer;
mod registry;
mod session;
mod sqlite;
mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use indexer::DocumentIndexer;
pub use registry::SessionRegistry;
pub use session::{ChatReply, ChatSession, Evidence, RETRIEVAL_TOP_K};
pub use sqlite::SqliteVectorStore;
pub use store::{collection_name, ChunkRecord, SearchHit, VectorStore};
