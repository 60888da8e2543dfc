//! Multipart upload orchestration.
//!
//! Upload sessions are never persisted: the storage backend's list of open
//! multipart uploads under `uploads/{owner}/` is the source of truth, and
//! finding the `(upload_id, key)` pair there is the ownership check.

use crate::constants::SIGNED_URL_TTL_SECS;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamhub_core::models::{CompletedPart, InitiateUploadResponse, Media, MediaMetadata, PartUrl};
use streamhub_core::{AppError, Role};
use streamhub_db::{MediaRepository, NewMedia};
use streamhub_services::{TranscodeRequest, TranscodeService};
use streamhub_storage::keys::{upload_key, upload_prefix};
use streamhub_storage::ObjectStorage;
use uuid::Uuid;

pub const MAX_PARTS: i32 = 10_000;

const UPLOAD_NOT_FOUND: &str = "Multipart upload not found or unauthorized";

/// Fails with `NotFound` unless `owner` has an open multipart upload with
/// exactly this id and key.
pub async fn ensure_open_upload(
    storage: &dyn ObjectStorage,
    owner: Uuid,
    upload_id: &str,
    key: &str,
) -> Result<(), AppError> {
    let prefix = upload_prefix(owner);
    if !key.starts_with(&prefix) {
        return Err(AppError::NotFound(UPLOAD_NOT_FOUND.to_string()));
    }

    let open = storage.list_multipart_uploads(&prefix).await?;
    if open
        .iter()
        .any(|upload| upload.upload_id == upload_id && upload.key == key)
    {
        Ok(())
    } else {
        Err(AppError::NotFound(UPLOAD_NOT_FOUND.to_string()))
    }
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    storage: Arc<dyn ObjectStorage>,
    transcoder: Arc<dyn TranscodeService>,
    media: MediaRepository,
}

impl UploadOrchestrator {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        transcoder: Arc<dyn TranscodeService>,
        media: MediaRepository,
    ) -> Self {
        Self {
            storage,
            transcoder,
            media,
        }
    }

    pub async fn initiate_upload(
        &self,
        owner: Uuid,
        filename: &str,
        content_type: &str,
    ) -> Result<InitiateUploadResponse, AppError> {
        if filename.trim().is_empty() || content_type.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "filename and content_type are required".to_string(),
            ));
        }

        let key = upload_key(owner, filename)?;
        let upload_id = self.storage.create_multipart(&key, content_type).await?;

        tracing::info!(owner_id = %owner, key = %key, "Multipart upload initiated");
        Ok(InitiateUploadResponse { upload_id, key })
    }

    pub async fn issue_part_urls(
        &self,
        owner: Uuid,
        upload_id: &str,
        key: &str,
        part_count: i32,
    ) -> Result<Vec<PartUrl>, AppError> {
        if !(1..=MAX_PARTS).contains(&part_count) {
            return Err(AppError::InvalidInput(format!(
                "parts must be between 1 and {}",
                MAX_PARTS
            )));
        }
        ensure_open_upload(self.storage.as_ref(), owner, upload_id, key).await?;

        let ttl = Duration::from_secs(SIGNED_URL_TTL_SECS);
        let mut urls = Vec::with_capacity(part_count as usize);
        for part_number in 1..=part_count {
            let url = self
                .storage
                .presign_upload_part(key, upload_id, part_number, ttl)
                .await?;
            urls.push(PartUrl { part_number, url });
        }
        Ok(urls)
    }

    /// Finalizes the object, records the media row and submits the transcode
    /// job. Once the object exists, a later failure deletes it again and
    /// retires the row so nothing is left half-created.
    pub async fn complete_upload(
        &self,
        owner: Uuid,
        role: Role,
        upload_id: &str,
        key: &str,
        mut parts: Vec<CompletedPart>,
        metadata: MediaMetadata,
    ) -> Result<Media, AppError> {
        ensure_open_upload(self.storage.as_ref(), owner, upload_id, key).await?;

        parts.sort_by_key(|part| part.part_number);
        self.storage.complete_multipart(key, upload_id, &parts).await?;

        let new_media = NewMedia {
            title: metadata.title,
            description: metadata.description,
            media_type: metadata.media_type,
            visibility: metadata.visibility,
            uploaded_by: owner,
            uploader_type: role.uploader_type(),
            s3_key_original: key.to_string(),
            upload_id: upload_id.to_string(),
            genres: metadata.genres.map(|g| g.into_vec()).unwrap_or_default(),
            tags: metadata.tags.map(|t| t.into_vec()).unwrap_or_default(),
            duration_seconds: metadata.duration_seconds,
            release_date: metadata.release_date,
            language: metadata.language,
            age_rating: metadata.age_rating,
            is_premium: metadata.is_premium,
        };

        let media = match self.media.create(new_media).await {
            Ok(media) => media,
            Err(e) => {
                self.compensate(key, None, &e).await;
                return Err(e);
            }
        };

        let started = Instant::now();
        let submitted = self
            .transcoder
            .submit_job(&TranscodeRequest {
                media_id: media.id,
                input_key: key.to_string(),
            })
            .await;
        let job_id = match submitted {
            Ok(job_id) => job_id,
            Err(e) => {
                let e = AppError::from(e);
                self.compensate(key, Some(media.id), &e).await;
                return Err(e);
            }
        };
        tracing::info!(
            media_id = %media.id,
            job_id = %job_id,
            duration_ms = started.elapsed().as_millis() as u64,
            "Transcode job submitted"
        );

        match self.media.set_job_id(media.id, &job_id).await {
            Ok(media) => Ok(media),
            Err(e) => {
                self.compensate(key, Some(media.id), &e).await;
                Err(e)
            }
        }
    }

    pub async fn abort_upload(&self, owner: Uuid, upload_id: &str, key: &str) -> Result<(), AppError> {
        ensure_open_upload(self.storage.as_ref(), owner, upload_id, key).await?;
        self.storage.abort_multipart(key, upload_id).await?;
        tracing::info!(owner_id = %owner, key = %key, "Multipart upload aborted");
        Ok(())
    }

    async fn compensate(&self, key: &str, media_id: Option<Uuid>, cause: &AppError) {
        tracing::warn!(
            key = %key,
            media_id = ?media_id,
            error = %cause,
            "Upload completion failed, removing finalized object"
        );

        if let Err(e) = self.storage.delete(key).await {
            tracing::error!(key = %key, error = %e, "Failed to delete orphaned upload");
        }
        if let Some(id) = media_id {
            if let Err(e) = self.media.fail_and_deactivate(id).await {
                tracing::error!(media_id = %id, error = %e, "Failed to retire media row");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use streamhub_storage::{MultipartUpload, StorageResult};

    struct OpenUploads(Vec<MultipartUpload>);

    #[async_trait]
    impl ObjectStorage for OpenUploads {
        async fn create_multipart(&self, _: &str, _: &str) -> StorageResult<String> {
            Ok("id".into())
        }
        async fn list_multipart_uploads(&self, prefix: &str) -> StorageResult<Vec<MultipartUpload>> {
            Ok(self
                .0
                .iter()
                .filter(|u| u.key.starts_with(prefix))
                .cloned()
                .collect())
        }
        async fn presign_upload_part(&self, _: &str, _: &str, _: i32, _: Duration) -> StorageResult<String> {
            Ok(String::new())
        }
        async fn complete_multipart(&self, _: &str, _: &str, _: &[CompletedPart]) -> StorageResult<()> {
            Ok(())
        }
        async fn abort_multipart(&self, _: &str, _: &str) -> StorageResult<()> {
            Ok(())
        }
        async fn presign_get(&self, _: &str, _: Duration) -> StorageResult<String> {
            Ok(String::new())
        }
        async fn presign_put(&self, _: &str, _: &str, _: Duration) -> StorageResult<String> {
            Ok(String::new())
        }
        async fn delete(&self, _: &str) -> StorageResult<()> {
            Ok(())
        }
        fn bucket_url(&self) -> &str {
            "https://cdn.test"
        }
    }

    #[tokio::test]
    async fn ownership_requires_matching_id_and_key_under_the_owner_prefix() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let key = format!("uploads/{}/abc/clip.mp4", owner);
        let storage = OpenUploads(vec![MultipartUpload {
            key: key.clone(),
            upload_id: "up-1".into(),
        }]);

        assert!(ensure_open_upload(&storage, owner, "up-1", &key).await.is_ok());
        assert!(matches!(
            ensure_open_upload(&storage, owner, "up-2", &key).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            ensure_open_upload(&storage, other, "up-1", &key).await,
            Err(AppError::NotFound(_))
        ));
    }
}
