use sqlx::{PgPool, Postgres, Transaction};
use streamhub_core::models::{Artist, ArtistSummary};
use streamhub_core::AppError;
use uuid::Uuid;

const ARTIST_COLUMNS: &str = r#"
    id, user_id, name, bio, profile_picture, social_links, genres, is_active, created_at, updated_at
"#;

/// Listing projection. `$1` is the optional caller used for `is_followed`.
const SUMMARY_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.name, a.bio, a.profile_picture, a.genres,
           (SELECT COUNT(*) FROM artist_follows f
              WHERE f.artist_id = a.id AND f.is_active) AS follower_count,
           EXISTS (SELECT 1 FROM artist_follows f
              WHERE f.artist_id = a.id AND f.user_id = $1 AND f.is_active) AS is_followed
    FROM artists a
"#;

#[derive(Debug, Clone)]
pub struct NewArtist {
    pub user_id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub social_links: serde_json::Value,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArtistPatch {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub social_links: Option<serde_json::Value>,
    pub genres: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct ArtistRepository {
    pool: PgPool,
}

impl ArtistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_active(&self, id: Uuid) -> Result<Option<Artist>, AppError> {
        let row = sqlx::query_as::<_, Artist>(&format!(
            "SELECT {} FROM artists WHERE id = $1 AND is_active",
            ARTIST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_user_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<Option<Artist>, AppError> {
        let row = sqlx::query_as::<_, Artist>(&format!(
            "SELECT {} FROM artists WHERE user_id = $1 AND is_active FOR UPDATE",
            ARTIST_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Case-insensitive check against active profiles, optionally excluding one artist.
    pub async fn name_taken(&self, name: &str, excluding: Option<Uuid>) -> Result<bool, AppError> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM artists
                WHERE LOWER(name) = LOWER($1) AND is_active
                  AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(name)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        artist: NewArtist,
    ) -> Result<Artist, AppError> {
        let row = sqlx::query_as::<_, Artist>(&format!(
            r#"
            INSERT INTO artists (id, user_id, name, bio, profile_picture, social_links, genres)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ARTIST_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(artist.user_id)
        .bind(&artist.name)
        .bind(&artist.bio)
        .bind(&artist.profile_picture)
        .bind(&artist.social_links)
        .bind(&artist.genres)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| AppError::from(e).conflict_on_unique("Artist name already exists"))?;
        Ok(row)
    }

    pub async fn deactivate_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE artists SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            "UPDATE artist_follows SET is_active = FALSE, updated_at = NOW() WHERE artist_id = $1",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn update(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: ArtistPatch,
    ) -> Result<Option<Artist>, AppError> {
        let row = sqlx::query_as::<_, Artist>(&format!(
            r#"
            UPDATE artists SET
                name = COALESCE($3, name),
                bio = COALESCE($4, bio),
                profile_picture = COALESCE($5, profile_picture),
                social_links = COALESCE($6, social_links),
                genres = COALESCE($7, genres),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND is_active
            RETURNING {}
            "#,
            ARTIST_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .bind(patch.name)
        .bind(patch.bio)
        .bind(patch.profile_picture)
        .bind(patch.social_links)
        .bind(patch.genres)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from(e).conflict_on_unique("Artist name already exists"))?;
        Ok(row)
    }

    /// Active artists with follower counts, unsorted.
    pub async fn list_summaries(
        &self,
        requester: Option<Uuid>,
    ) -> Result<Vec<ArtistSummary>, AppError> {
        let rows = sqlx::query_as::<_, ArtistSummary>(&format!(
            "{} WHERE a.is_active",
            SUMMARY_SELECT
        ))
        .bind(requester)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn summary(
        &self,
        id: Uuid,
        requester: Option<Uuid>,
    ) -> Result<Option<ArtistSummary>, AppError> {
        let row = sqlx::query_as::<_, ArtistSummary>(&format!(
            "{} WHERE a.is_active AND a.id = $2",
            SUMMARY_SELECT
        ))
        .bind(requester)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Starts following, or reactivates an earlier unfollow. `false` when the
    /// follow is already active. A concurrent first follow waits on the
    /// conflicting insert and then sees the active row.
    pub async fn follow_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        artist_id: Uuid,
    ) -> Result<bool, AppError> {
        let changed: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO artist_follows (user_id, artist_id, is_active)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (user_id, artist_id)
            DO UPDATE SET is_active = TRUE, updated_at = NOW()
            WHERE NOT artist_follows.is_active
            RETURNING artist_id
            "#,
        )
        .bind(user_id)
        .bind(artist_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(changed.is_some())
    }

    /// Deactivates an active follow. `false` when there was none.
    pub async fn unfollow_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        artist_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE artist_follows SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND artist_id = $2 AND is_active
            "#,
        )
        .bind(user_id)
        .bind(artist_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
