use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::{AppPaths, Settings};
use crate::extract::{DocumentExtractor, HttpExtractor};
use crate::llm::{GeminiProvider, LlmProvider};
use crate::pipeline::StudyAidsPipeline;
use crate::rag::{DocumentIndexer, SessionRegistry, SqliteVectorStore, VectorStore};
use crate::storage::{BlobStore, LocalBlobStore};

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Settings,
    pub provider: Arc<dyn LlmProvider>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub blobs: Arc<dyn BlobStore>,
    pub indexer: DocumentIndexer,
    pub registry: SessionRegistry,
    pub pipeline: StudyAidsPipeline,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let settings = Settings::load(&paths);
        Self::with_parts(paths, settings).await
    }

    pub async fn with_parts(paths: Arc<AppPaths>, settings: Settings) -> anyhow::Result<Arc<Self>> {
        let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(
            settings.gemini.base_url.clone(),
            settings.gemini.api_key.clone(),
        ));
        let extractor: Arc<dyn DocumentExtractor> =
            Arc::new(HttpExtractor::new(settings.extraction.base_url.clone()));
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(paths.raw_dir.clone()));

        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(&paths).await?);

        let indexer = DocumentIndexer::new(
            store.clone(),
            provider.clone(),
            settings.gemini.embedding_model.clone(),
        );
        let registry = SessionRegistry::new(
            store,
            provider.clone(),
            settings.gemini.chat_model.clone(),
            settings.gemini.embedding_model.clone(),
            settings.rag.session_capacity,
        );
        let pipeline =
            StudyAidsPipeline::new(provider.clone(), settings.gemini.chat_model.clone());

        Ok(Arc::new(AppState {
            paths,
            settings,
            provider,
            extractor,
            blobs,
            indexer,
            registry,
            pipeline,
            started_at: Utc::now(),
        }))
    }
}
