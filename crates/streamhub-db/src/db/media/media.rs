use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use streamhub_core::models::{
    Media, MediaType, NewVariant, UploaderType, Visibility,
};
use streamhub_core::AppError;
use uuid::Uuid;

use crate::db::transaction::with_transaction;

pub(crate) const MEDIA_COLUMNS: &str = r#"
    id, title, description, media_type, visibility, uploaded_by, uploader_type,
    s3_key_original, upload_id, transcode_job_id, transcoding_status, media_url,
    thumbnail_url, captions_url, duration_seconds, genres, tags, release_date,
    language, age_rating, is_active, is_published, is_premium, views, like_count,
    dislike_count, shares_count, created_at, updated_at
"#;

/// Catalog row written when an upload completes.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub title: String,
    pub description: Option<String>,
    pub media_type: MediaType,
    pub visibility: Visibility,
    pub uploaded_by: Uuid,
    pub uploader_type: UploaderType,
    pub s3_key_original: String,
    pub upload_id: String,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub duration_seconds: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub language: Option<String>,
    pub age_rating: Option<String>,
    pub is_premium: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub visibility: Option<Visibility>,
    pub media_type: Option<MediaType>,
    pub genres: Vec<String>,
}

/// Owner-supplied metadata edits; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct MediaPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub genres: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub release_date: Option<NaiveDate>,
    pub language: Option<String>,
    pub age_rating: Option<String>,
    pub is_published: Option<bool>,
    pub is_premium: Option<bool>,
    pub captions_url: Option<String>,
}

#[derive(Clone)]
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly uploaded media record. Records start in `processing`.
    pub async fn create(&self, media: NewMedia) -> Result<Media, AppError> {
        let row = sqlx::query_as::<_, Media>(&format!(
            r#"
            INSERT INTO media (
                id, title, description, media_type, visibility, uploaded_by, uploader_type,
                s3_key_original, upload_id, transcoding_status, genres, tags,
                duration_seconds, release_date, language, age_rating, is_premium
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'processing', $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&media.title)
        .bind(&media.description)
        .bind(media.media_type)
        .bind(media.visibility)
        .bind(media.uploaded_by)
        .bind(media.uploader_type)
        .bind(&media.s3_key_original)
        .bind(&media.upload_id)
        .bind(&media.genres)
        .bind(&media.tags)
        .bind(media.duration_seconds)
        .bind(media.release_date)
        .bind(&media.language)
        .bind(&media.age_rating)
        .bind(media.is_premium)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn set_job_id(&self, id: Uuid, job_id: &str) -> Result<Media, AppError> {
        let row = sqlx::query_as::<_, Media>(&format!(
            r#"
            UPDATE media SET transcode_job_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound("Media not found".to_string()))
    }

    /// Active media by id, regardless of visibility.
    pub async fn find_active(&self, id: Uuid) -> Result<Option<Media>, AppError> {
        let row = sqlx::query_as::<_, Media>(&format!(
            "SELECT {} FROM media WHERE id = $1 AND is_active",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Active media that is public or owned by `requester`, newest first.
    pub async fn list_visible(
        &self,
        requester: Uuid,
        filter: &MediaFilter,
    ) -> Result<Vec<Media>, AppError> {
        let rows = sqlx::query_as::<_, Media>(&format!(
            r#"
            SELECT {} FROM media
            WHERE is_active
              AND (visibility = 'public' OR uploaded_by = $1)
              AND ($2::visibility IS NULL OR visibility = $2)
              AND ($3::media_type IS NULL OR media_type = $3)
              AND (cardinality($4::text[]) = 0 OR genres && $4)
            ORDER BY created_at DESC
            "#,
            MEDIA_COLUMNS
        ))
        .bind(requester)
        .bind(filter.visibility)
        .bind(filter.media_type)
        .bind(&filter.genres)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Apply an owner edit. Returns `None` when the media is missing, inactive or not owned.
    pub async fn update_metadata(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: MediaPatch,
    ) -> Result<Option<Media>, AppError> {
        let row = sqlx::query_as::<_, Media>(&format!(
            r#"
            UPDATE media SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                visibility = COALESCE($5, visibility),
                genres = COALESCE($6, genres),
                tags = COALESCE($7, tags),
                release_date = COALESCE($8, release_date),
                language = COALESCE($9, language),
                age_rating = COALESCE($10, age_rating),
                is_published = COALESCE($11, is_published),
                is_premium = COALESCE($12, is_premium),
                captions_url = COALESCE($13, captions_url),
                updated_at = NOW()
            WHERE id = $1 AND uploaded_by = $2 AND is_active
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.visibility)
        .bind(patch.genres)
        .bind(patch.tags)
        .bind(patch.release_date)
        .bind(patch.language)
        .bind(patch.age_rating)
        .bind(patch.is_published)
        .bind(patch.is_premium)
        .bind(patch.captions_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn set_thumbnail(
        &self,
        id: Uuid,
        owner: Uuid,
        thumbnail_url: &str,
    ) -> Result<Option<Media>, AppError> {
        let row = sqlx::query_as::<_, Media>(&format!(
            r#"
            UPDATE media SET thumbnail_url = $3, updated_at = NOW()
            WHERE id = $1 AND uploaded_by = $2 AND is_active
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .bind(thumbnail_url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Soft-disable an owned media record and drop its variants.
    pub async fn deactivate(&self, id: Uuid, owner: Uuid) -> Result<bool, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let result = sqlx::query(
                    r#"
                    UPDATE media SET is_active = FALSE, updated_at = NOW()
                    WHERE id = $1 AND uploaded_by = $2 AND is_active
                    "#,
                )
                .bind(id)
                .bind(owner)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Ok(false);
                }

                sqlx::query("DELETE FROM media_variants WHERE media_id = $1")
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;

                Ok(true)
            })
        })
        .await
    }

    /// Finish a transcode: flip `processing` to `completed`, set the master
    /// playlist and write the variants. Returns false when another reader got
    /// there first; the variant insert is a no-op for rows that already exist.
    pub async fn complete_transcoding(
        &self,
        id: Uuid,
        media_url: &str,
        variants: &[NewVariant],
    ) -> Result<bool, AppError> {
        let media_url = media_url.to_string();
        let variants = variants.to_vec();

        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let result = sqlx::query(
                    r#"
                    UPDATE media
                    SET transcoding_status = 'completed', media_url = $2, updated_at = NOW()
                    WHERE id = $1 AND transcoding_status = 'processing'
                    "#,
                )
                .bind(id)
                .bind(&media_url)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Ok(false);
                }

                for variant in &variants {
                    sqlx::query(
                        r#"
                        INSERT INTO media_variants (id, media_id, resolution, stream_url, bitrate_kbps, format)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ON CONFLICT (media_id, resolution) DO NOTHING
                        "#,
                    )
                    .bind(Uuid::new_v4())
                    .bind(id)
                    .bind(variant.resolution)
                    .bind(&variant.stream_url)
                    .bind(variant.bitrate_kbps)
                    .bind(variant.format)
                    .execute(&mut **tx)
                    .await?;
                }

                Ok(true)
            })
        })
        .await
    }

    /// `processing` -> `failed`. Returns false if the status already moved on.
    pub async fn mark_failed(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE media SET transcoding_status = 'failed', updated_at = NOW()
            WHERE id = $1 AND transcoding_status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Compensation after a failed upload completion: fail and hide the record.
    pub async fn fail_and_deactivate(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE media
            SET transcoding_status = 'failed', media_url = NULL, is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND transcoding_status <> 'completed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Hide every media a user uploaded with the given uploader type.
    pub async fn deactivate_by_uploader_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        uploader_type: UploaderType,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE media SET is_active = FALSE, updated_at = NOW()
            WHERE uploaded_by = $1 AND uploader_type = $2 AND is_active
            "#,
        )
        .bind(user_id)
        .bind(uploader_type)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }
}
