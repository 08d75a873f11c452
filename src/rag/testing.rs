//! Shared test double for the provider seam.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::llm::{ChatRequest, LlmProvider};

/// Deterministic provider: every embed call returns a fixed vector per
/// input, every chat call returns a canned reply and records the request
/// for prompt assertions.
pub(crate) struct MockProvider {
    reply: String,
    embedding: Vec<f32>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            embedding: vec![1.0, 0.0],
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_query_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.reply.clone())
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        Ok(inputs.iter().map(|_| self.embedding.clone()).collect())
    }
}
