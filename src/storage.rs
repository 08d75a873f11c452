//! Raw-file retention.
//!
//! Uploaded originals are kept for later reference but are never read back
//! by the RAG core. The trait mirrors the narrow bucket contract of the
//! hosted deployment; `LocalBlobStore` keeps files under the data dir.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::errors::ApiError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the file at `local_path` under `dst_name`, returning a URI for
    /// the retained copy.
    async fn upload(&self, local_path: &Path, dst_name: &str) -> Result<String, ApiError>;
}

#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, local_path: &Path, dst_name: &str) -> Result<String, ApiError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(ApiError::internal)?;

        let dst = self.root.join(dst_name);
        tokio::fs::copy(local_path, &dst)
            .await
            .map_err(ApiError::internal)?;

        Ok(format!("file://{}", dst.display()))
    }
}
