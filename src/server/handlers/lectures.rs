use std::path::Path;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    /// The doc_id returned by the upload response.
    pub doc_id: String,
    pub message: String,
}

/// Upload a lecture document: extract, index, retain the raw file, and
/// generate study aids. Indexing completes before the response is sent, so
/// the returned `doc_id` is immediately chattable.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut audience = "novice".to_string();
    let mut purpose = "understanding".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        match field.name() {
            Some("file") => {
                original_name = field.file_name().map(sanitize_filename);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                file_bytes = Some(bytes.to_vec());
            }
            Some("audience") => {
                audience = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            Some("purpose") => {
                purpose = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
            }
            _ => {}
        }
    }

    let bytes = file_bytes
        .ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;
    let filename = original_name.unwrap_or_else(|| "document.pdf".to_string());

    let scratch = tempfile::tempdir().map_err(ApiError::internal)?;
    let local_path = scratch.path().join(&filename);
    tokio::fs::write(&local_path, &bytes)
        .await
        .map_err(ApiError::internal)?;

    let doc = state.extractor.extract(&local_path).await?;

    let doc_id = mint_doc_id(&filename);
    let indexed = state.indexer.index(&doc, &doc_id, &filename).await?;
    tracing::info!("Document {} indexed with {} chunks", doc_id, indexed);

    let raw_uri = state.blobs.upload(&local_path, &doc_id).await?;
    tracing::debug!("Raw file retained at {}", raw_uri);

    let aids = state.pipeline.run(&doc.full_text, &audience, &purpose).await?;

    Ok(Json(json!({
        "doc_id": doc_id,
        "meta": {
            "pageCount": doc.pages.len(),
            "lowTextPages": doc.low_text_pages,
            "tablesTotal": doc.tables_total,
        },
        "summary": aids.summary,
        "glossary": aids.glossary,
        "terms": aids.glossary,
        "questions": aids.questions,
        "counts": {
            "terms": aids.glossary.len(),
            "questions": aids.questions.len(),
            "summarySections": aids.summary.sections.len(),
        },
    })))
}

/// One conversational turn against an uploaded document.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let session = state.registry.get_or_create(&payload.doc_id).await?;
    let reply = session.chat(&payload.message).await?;
    Ok(Json(reply))
}

/// Timestamp + random fragment + original filename. The uuid fragment makes
/// uniqueness explicit; two same-second uploads of one filename no longer
/// collide.
fn mint_doc_id(filename: &str) -> String {
    let stamp = Utc::now().timestamp();
    let nonce = Uuid::new_v4().simple().to_string();
    format!("{stamp}-{}_{filename}", &nonce[..8])
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "document.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_ids_are_unique_for_identical_uploads() {
        let a = mint_doc_id("lecture.pdf");
        let b = mint_doc_id("lecture.pdf");
        assert_ne!(a, b);
        assert!(a.ends_with("_lecture.pdf"));
    }

    #[test]
    fn filenames_lose_directory_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("slides.pdf"), "slides.pdf");
        assert_eq!(sanitize_filename(""), "document.pdf");
    }
}
