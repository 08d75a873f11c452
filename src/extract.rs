//! Contract with the document extraction service.
//!
//! Extraction (OCR, table detection) runs out of process; this module only
//! defines the result shape the rest of the backend consumes and an HTTP
//! adapter that ships a raw file to the service.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// One unit of extracted source content. Never mutated after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub index: u32,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub low_text_pages: Vec<u32>,
    #[serde(default)]
    pub tables_total: u32,
    #[serde(default)]
    pub full_text: String,
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, file_path: &Path) -> Result<ExtractedDocument, ApiError>;
}

/// Posts the raw file body to the extraction service and decodes its JSON
/// response.
#[derive(Clone)]
pub struct HttpExtractor {
    base_url: String,
    client: Client,
}

impl HttpExtractor {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl DocumentExtractor for HttpExtractor {
    async fn extract(&self, file_path: &Path) -> Result<ExtractedDocument, ApiError> {
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        let bytes = tokio::fs::read(file_path).await.map_err(ApiError::internal)?;

        let url = format!("{}/extract", self.base_url);
        let res = self
            .client
            .post(&url)
            .query(&[("filename", filename.as_str())])
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "extraction service failed ({status}): {text}"
            )));
        }

        res.json::<ExtractedDocument>()
            .await
            .map_err(ApiError::upstream)
    }
}
