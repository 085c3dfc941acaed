//! Blob storage for images (avatars, covers, character portraits).
//!
//! Uploads are validated locally before any store call: the MIME type must be
//! an image type and the payload must fit the size limit.

use crate::config::SyncConfig;
use crate::errors::{StoreError, UploadError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default upload limit: 5 MiB.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return a download URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError>;
}

/// A file picked for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

pub fn validate_image(file: &ImageFile, max_bytes: usize) -> Result<(), UploadError> {
    if !file.content_type.starts_with("image/") {
        return Err(UploadError::Validation(format!(
            "{} is not an image ({})",
            file.name, file.content_type
        )));
    }
    if file.bytes.len() > max_bytes {
        return Err(UploadError::Validation(format!(
            "{} is {} bytes, the limit is {} bytes",
            file.name,
            file.bytes.len(),
            max_bytes
        )));
    }
    Ok(())
}

/// Storage path for an upload: `{folder}/{owner}/{millis}-{file name}`.
pub fn blob_path(folder: &str, owner: &str, file_name: &str, at: DateTime<Utc>) -> String {
    let file_name = file_name.replace('/', "_");
    format!("{}/{}/{}-{}", folder, owner, at.timestamp_millis(), file_name)
}

/// Validates and uploads images to a [`BlobStore`].
#[derive(Clone)]
pub struct ImageUploader {
    store: Arc<dyn BlobStore>,
    max_bytes: usize,
}

impl ImageUploader {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    /// Uploader limited to the configured `maxUploadBytes`.
    pub fn from_config(store: Arc<dyn BlobStore>, config: &SyncConfig) -> Self {
        Self::new(store).with_max_bytes(config.max_upload_bytes)
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Upload `file` under `folder/owner`. Returns the download URL.
    pub async fn upload_image(&self, folder: &str, owner: &str, file: ImageFile) -> Result<String, UploadError> {
        if let Err(e) = validate_image(&file, self.max_bytes) {
            tracing::warn!(file = %file.name, error = %e, "Rejected upload");
            return Err(e);
        }

        let path = blob_path(folder, owner, &file.name, Utc::now());
        let url = self.store.upload(&path, file.bytes, &file.content_type).await?;
        tracing::info!(path = %path, "Uploaded image");
        Ok(url)
    }
}

/// In-process [`BlobStore`].
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<BlobInner>>,
}

#[derive(Default)]
struct BlobInner {
    blobs: HashMap<String, (String, Vec<u8>)>,
    uploads: usize,
    failures: usize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upload calls, including failed ones.
    pub async fn upload_count(&self) -> usize {
        self.inner.lock().await.uploads
    }

    pub async fn fail_next(&self, times: usize) {
        self.inner.lock().await.failures = times;
    }

    /// Content type and bytes stored at `path`.
    pub async fn get(&self, path: &str) -> Option<(String, Vec<u8>)> {
        self.inner.lock().await.blobs.get(path).cloned()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.inner.lock().await.blobs.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.uploads += 1;
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(StoreError::Unavailable("injected upload failure".to_string()));
        }

        inner
            .blobs
            .insert(path.to_string(), (content_type.to_string(), bytes));
        Ok(format!("memory://{}", path))
    }
}
