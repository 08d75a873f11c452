//! Study-aids generation pipeline.
//!
//! Runs once per upload, after extraction and indexing: a single structured
//! generation call that turns the full extracted text into a summary,
//! glossary, and practice questions. Independent of the chat path, which
//! never consults these results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarySection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub sections: Vec<SummarySection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeQuestion {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudyAids {
    #[serde(default)]
    pub summary: Summary,
    #[serde(default)]
    pub glossary: Vec<GlossaryTerm>,
    #[serde(default)]
    pub questions: Vec<PracticeQuestion>,
}

pub struct StudyAidsPipeline {
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
}

impl StudyAidsPipeline {
    pub fn new(provider: Arc<dyn LlmProvider>, chat_model: String) -> Self {
        Self {
            provider,
            chat_model,
        }
    }

    pub async fn run(
        &self,
        full_text: &str,
        audience: &str,
        purpose: &str,
    ) -> Result<StudyAids, ApiError> {
        let system = ChatMessage::system(
            "You generate study aids for lecture material. Respond with a single \
             JSON object with keys: summary (object with a sections array of \
             {title, content}), glossary (array of {term, definition}), and \
             questions (array of {question, answer}). No prose outside the JSON.",
        );
        let user = ChatMessage::user(format!(
            "Audience: {audience}\nPurpose: {purpose}\n\nLecture text:\n{full_text}"
        ));

        let raw = self
            .provider
            .chat(ChatRequest::new(vec![system, user]), &self.chat_model)
            .await?;

        let cleaned = strip_code_fence(&raw);
        serde_json::from_str::<StudyAids>(cleaned).map_err(|err| {
            ApiError::Upstream(format!("study-aids response was not valid JSON: {err}"))
        })
    }
}

/// Models often wrap JSON in a ```json fence despite instructions.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
