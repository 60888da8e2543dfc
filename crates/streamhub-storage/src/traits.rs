//! Object storage abstraction
//!
//! Media bytes never pass through the API: clients upload parts directly to
//! presigned URLs and the API only orchestrates the multipart session.

use async_trait::async_trait;
use std::time::Duration;
use streamhub_core::models::CompletedPart;
use streamhub_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Presigning failed: {0}")]
    PresignFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// An in-progress multipart upload as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Start a multipart upload and return its upload id.
    async fn create_multipart(&self, key: &str, content_type: &str) -> StorageResult<String>;

    /// In-progress multipart uploads whose key starts with `prefix`.
    async fn list_multipart_uploads(&self, prefix: &str) -> StorageResult<Vec<MultipartUpload>>;

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StorageResult<String>;

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    /// Presigned GET for a stored object.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Presigned PUT for single-shot uploads (thumbnails).
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Public base URL objects are served from, without a trailing slash.
    fn bucket_url(&self) -> &str;
}
