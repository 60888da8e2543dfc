//! Media catalog reads and owner edits.
//!
//! Transcoding completion is never pushed to us. A `processing` record is
//! reconciled against the transcoder when it is read; a record nobody reads
//! stays `processing` indefinitely.

use crate::constants::SIGNED_URL_TTL_SECS;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamhub_core::models::{
    Media, MediaListQuery, MediaVariant, MediaWithVariants, RenditionLadder, Resolution,
    SignedAccess, ThumbnailUploadResponse, TranscodingStatus, UpdateMediaRequest,
};
use streamhub_core::AppError;
use streamhub_db::{MediaFilter, MediaPatch, MediaRepository, VariantRepository};
use streamhub_services::{JobStatus, TranscodeService};
use streamhub_storage::keys::{public_url, strip_bucket_url, thumbnail_key, thumbnail_prefix};
use streamhub_storage::ObjectStorage;
use uuid::Uuid;

const MEDIA_NOT_FOUND: &str = "Media not found";
const NOT_FOUND_OR_UNAUTHORIZED: &str = "Media not found or unauthorized";

fn not_found_or_unauthorized() -> AppError {
    AppError::NotFound(NOT_FOUND_OR_UNAUTHORIZED.to_string())
}

#[derive(Clone)]
pub struct MediaCatalog {
    storage: Arc<dyn ObjectStorage>,
    transcoder: Arc<dyn TranscodeService>,
    media: MediaRepository,
    variants: VariantRepository,
    bucket_url: String,
}

impl MediaCatalog {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        transcoder: Arc<dyn TranscodeService>,
        media: MediaRepository,
        variants: VariantRepository,
        bucket_url: String,
    ) -> Self {
        Self {
            storage,
            transcoder,
            media,
            variants,
            bucket_url,
        }
    }

    /// Reads one media record, reconciling it with its transcode job first.
    pub async fn get_media(&self, requester: Uuid, id: Uuid) -> Result<MediaWithVariants, AppError> {
        let media = self
            .media
            .find_active(id)
            .await?
            .filter(|m| m.is_accessible_by(requester))
            .ok_or_else(|| AppError::NotFound(MEDIA_NOT_FOUND.to_string()))?;

        let media = self.reconcile(media).await?;
        let variants = self.variants.list_for_media(media.id).await?;
        Ok(MediaWithVariants { media, variants })
    }

    async fn reconcile(&self, media: Media) -> Result<Media, AppError> {
        if media.transcoding_status != TranscodingStatus::Processing {
            return Ok(media);
        }
        let Some(job_id) = media.transcode_job_id.clone() else {
            return Ok(media);
        };

        let started = Instant::now();
        let status = self.transcoder.job_status(&job_id).await?;
        tracing::debug!(
            media_id = %media.id,
            job_id = %job_id,
            status = ?status,
            duration_ms = started.elapsed().as_millis() as u64,
            "Transcode job status fetched"
        );

        match status {
            JobStatus::Complete => {
                if media.media_url.is_some() {
                    return Ok(media);
                }
                let stem = media.original_stem();
                let master = RenditionLadder::master_playlist_url(&self.bucket_url, media.id, stem);
                let variants = RenditionLadder::variants_for(&self.bucket_url, media.id, stem);

                if self
                    .media
                    .complete_transcoding(media.id, &master, &variants)
                    .await?
                {
                    tracing::info!(media_id = %media.id, "Transcoding reconciled as completed");
                }
                self.media
                    .find_active(media.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(MEDIA_NOT_FOUND.to_string()))
            }
            status if status.is_failure() => {
                if self.media.mark_failed(media.id).await? {
                    tracing::warn!(media_id = %media.id, job_id = %job_id, "Transcoding failed");
                }
                Err(AppError::ProcessingFailed(
                    "Media transcoding failed. Please try again later.".to_string(),
                ))
            }
            _ => Err(AppError::StillProcessing(
                "Media is still being processed. Please check back shortly.".to_string(),
            )),
        }
    }

    /// Active media the requester may read: public, or their own.
    pub async fn accessible_media(&self, requester: Uuid, id: Uuid) -> Result<Media, AppError> {
        self.media
            .find_active(id)
            .await?
            .filter(|m| m.is_accessible_by(requester))
            .ok_or_else(not_found_or_unauthorized)
    }

    /// Signs a rendition's stream for `ttl`.
    pub async fn sign_variant(
        &self,
        requester: Uuid,
        media_id: Uuid,
        resolution: Resolution,
        ttl: Duration,
    ) -> Result<(MediaVariant, String), AppError> {
        let media = self.accessible_media(requester, media_id).await?;
        let variant = self
            .variants
            .find(media.id, resolution)
            .await?
            .ok_or_else(not_found_or_unauthorized)?;
        let key = strip_bucket_url(&self.bucket_url, &variant.stream_url).ok_or_else(|| {
            AppError::Internal(format!(
                "Variant URL is outside the bucket: {}",
                variant.stream_url
            ))
        })?;
        let url = self.storage.presign_get(key, ttl).await?;
        Ok((variant, url))
    }

    pub async fn issue_access_url(
        &self,
        requester: Uuid,
        media_id: Uuid,
        resolution: Option<Resolution>,
    ) -> Result<SignedAccess, AppError> {
        let ttl = Duration::from_secs(SIGNED_URL_TTL_SECS);
        let url = match resolution {
            Some(resolution) => self.sign_variant(requester, media_id, resolution, ttl).await?.1,
            None => {
                let media = self.accessible_media(requester, media_id).await?;
                self.storage.presign_get(&media.s3_key_original, ttl).await?
            }
        };
        Ok(SignedAccess {
            url,
            expires_in: SIGNED_URL_TTL_SECS,
        })
    }

    pub async fn list_media(&self, requester: Uuid, query: MediaListQuery) -> Result<Vec<Media>, AppError> {
        let filter = MediaFilter {
            visibility: query.visibility,
            media_type: query.media_type,
            genres: query
                .genres
                .map(|g| {
                    g.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };
        self.media.list_visible(requester, &filter).await
    }

    pub async fn update_media(
        &self,
        owner: Uuid,
        id: Uuid,
        request: UpdateMediaRequest,
    ) -> Result<Media, AppError> {
        let patch = MediaPatch {
            title: request.title,
            description: request.description,
            visibility: request.visibility,
            genres: request.genres.map(|g| g.into_vec()),
            tags: request.tags.map(|t| t.into_vec()),
            release_date: request.release_date,
            language: request.language,
            age_rating: request.age_rating,
            is_published: request.is_published,
            is_premium: request.is_premium,
            captions_url: request.captions_url,
        };
        self.media
            .update_metadata(id, owner, patch)
            .await?
            .ok_or_else(not_found_or_unauthorized)
    }

    /// Soft-disables the record and drops its variants, then removes the
    /// original object.
    pub async fn delete_media(&self, owner: Uuid, id: Uuid) -> Result<(), AppError> {
        let media = self
            .media
            .find_active(id)
            .await?
            .filter(|m| m.is_owned_by(owner))
            .ok_or_else(not_found_or_unauthorized)?;

        if !self.media.deactivate(media.id, owner).await? {
            return Err(not_found_or_unauthorized());
        }

        if let Err(e) = self.storage.delete(&media.s3_key_original).await {
            tracing::error!(
                media_id = %media.id,
                key = %media.s3_key_original,
                error = %e,
                "Failed to delete original object"
            );
        }
        Ok(())
    }

    pub async fn initiate_thumbnail_upload(
        &self,
        owner: Uuid,
        media_id: Uuid,
        filename: &str,
        content_type: &str,
    ) -> Result<ThumbnailUploadResponse, AppError> {
        self.media
            .find_active(media_id)
            .await?
            .filter(|m| m.is_owned_by(owner))
            .ok_or_else(not_found_or_unauthorized)?;

        let key = thumbnail_key(owner, media_id, filename)?;
        let url = self
            .storage
            .presign_put(&key, content_type, Duration::from_secs(SIGNED_URL_TTL_SECS))
            .await?;
        Ok(ThumbnailUploadResponse { url, key })
    }

    pub async fn confirm_thumbnail(&self, owner: Uuid, media_id: Uuid, key: &str) -> Result<Media, AppError> {
        if !key.starts_with(&thumbnail_prefix(owner, media_id)) {
            return Err(AppError::InvalidInput(
                "Thumbnail key does not belong to this media".to_string(),
            ));
        }
        let url = public_url(&self.bucket_url, key);
        self.media
            .set_thumbnail(media_id, owner, &url)
            .await?
            .ok_or_else(not_found_or_unauthorized)
    }
}
