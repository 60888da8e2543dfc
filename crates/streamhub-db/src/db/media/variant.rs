use sqlx::PgPool;
use streamhub_core::models::{MediaVariant, Resolution};
use streamhub_core::AppError;
use uuid::Uuid;

const VARIANT_COLUMNS: &str =
    "id, media_id, resolution, stream_url, bitrate_kbps, file_size, format, created_at";

/// Read access to transcoded renditions. Rows are only written by
/// `MediaRepository::complete_transcoding`.
#[derive(Clone)]
pub struct VariantRepository {
    pool: PgPool,
}

impl VariantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_media(&self, media_id: Uuid) -> Result<Vec<MediaVariant>, AppError> {
        let rows = sqlx::query_as::<_, MediaVariant>(&format!(
            "SELECT {} FROM media_variants WHERE media_id = $1 ORDER BY bitrate_kbps",
            VARIANT_COLUMNS
        ))
        .bind(media_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn find(
        &self,
        media_id: Uuid,
        resolution: Resolution,
    ) -> Result<Option<MediaVariant>, AppError> {
        let row = sqlx::query_as::<_, MediaVariant>(&format!(
            "SELECT {} FROM media_variants WHERE media_id = $1 AND resolution = $2",
            VARIANT_COLUMNS
        ))
        .bind(media_id)
        .bind(resolution)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
