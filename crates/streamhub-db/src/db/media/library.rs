use chrono::{DateTime, Utc};
use sqlx::PgPool;
use streamhub_core::models::{
    Bookmark, CreatorType, Download, Playlist, PlaylistItem, Visibility, WatchHistoryEntry,
};
use streamhub_core::AppError;
use uuid::Uuid;

use crate::db::transaction::with_transaction;

const PLAYLIST_COLUMNS: &str =
    "id, name, description, created_by, creator_type, visibility, is_active, created_at, updated_at";

const DOWNLOAD_COLUMNS: &str =
    "id, user_id, media_id, variant_id, signed_url, expires_at, is_deleted, created_at, updated_at";

/// The two per-user media bookmark lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkList {
    Favourites,
    WatchLater,
}

impl BookmarkList {
    fn table(self) -> &'static str {
        match self {
            BookmarkList::Favourites => "favourites",
            BookmarkList::WatchLater => "watch_later",
        }
    }
}

/// Playlists, watch history, bookmarks and download grants.
#[derive(Clone)]
pub struct LibraryRepository {
    pool: PgPool,
}

impl LibraryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// How many of `ids` name active media.
    pub async fn count_active_media(&self, ids: &[Uuid]) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT id) FROM media WHERE id = ANY($1) AND is_active",
        )
        .bind(ids)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn create_playlist(
        &self,
        owner: Uuid,
        creator_type: CreatorType,
        name: String,
        description: Option<String>,
        visibility: Visibility,
        media_ids: Vec<Uuid>,
    ) -> Result<Playlist, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let playlist = sqlx::query_as::<_, Playlist>(&format!(
                    r#"
                    INSERT INTO playlists (id, name, description, created_by, creator_type, visibility)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING {}
                    "#,
                    PLAYLIST_COLUMNS
                ))
                .bind(Uuid::new_v4())
                .bind(&name)
                .bind(&description)
                .bind(owner)
                .bind(creator_type)
                .bind(visibility)
                .fetch_one(&mut **tx)
                .await?;

                for (position, media_id) in media_ids.iter().enumerate() {
                    sqlx::query(
                        r#"
                        INSERT INTO playlist_items (playlist_id, media_id, position)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (playlist_id, media_id) DO NOTHING
                        "#,
                    )
                    .bind(playlist.id)
                    .bind(media_id)
                    .bind(position as i32)
                    .execute(&mut **tx)
                    .await?;
                }

                Ok(playlist)
            })
        })
        .await
    }

    pub async fn find_playlist(&self, id: Uuid) -> Result<Option<Playlist>, AppError> {
        let row = sqlx::query_as::<_, Playlist>(&format!(
            "SELECT {} FROM playlists WHERE id = $1 AND is_active",
            PLAYLIST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_playlists(&self, owner: Uuid) -> Result<Vec<Playlist>, AppError> {
        let rows = sqlx::query_as::<_, Playlist>(&format!(
            r#"
            SELECT {} FROM playlists
            WHERE created_by = $1 AND is_active
            ORDER BY created_at DESC
            "#,
            PLAYLIST_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn playlist_items(&self, playlist_id: Uuid) -> Result<Vec<PlaylistItem>, AppError> {
        let rows = sqlx::query_as::<_, PlaylistItem>(
            r#"
            SELECT pi.media_id, m.title, m.thumbnail_url, pi.position, pi.added_at
            FROM playlist_items pi
            JOIN media m ON m.id = pi.media_id
            WHERE pi.playlist_id = $1 AND m.is_active
            ORDER BY pi.position
            "#,
        )
        .bind(playlist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Only user-created playlists owned by `owner` are updated.
    pub async fn update_playlist(
        &self,
        id: Uuid,
        owner: Uuid,
        name: Option<String>,
        description: Option<String>,
        visibility: Option<Visibility>,
    ) -> Result<Option<Playlist>, AppError> {
        let row = sqlx::query_as::<_, Playlist>(&format!(
            r#"
            UPDATE playlists SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                visibility = COALESCE($5, visibility),
                updated_at = NOW()
            WHERE id = $1 AND created_by = $2 AND creator_type = 'user' AND is_active
            RETURNING {}
            "#,
            PLAYLIST_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .bind(name)
        .bind(description)
        .bind(visibility)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Append media at the end of the playlist. Returns false if it was already there.
    pub async fn add_playlist_item(&self, playlist_id: Uuid, media_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO playlist_items (playlist_id, media_id, position)
            SELECT $1, $2, COALESCE(MAX(position) + 1, 0)
            FROM playlist_items WHERE playlist_id = $1
            ON CONFLICT (playlist_id, media_id) DO NOTHING
            "#,
        )
        .bind(playlist_id)
        .bind(media_id)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE playlists SET updated_at = NOW() WHERE id = $1")
            .bind(playlist_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_playlist_item(
        &self,
        playlist_id: Uuid,
        media_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM playlist_items WHERE playlist_id = $1 AND media_id = $2")
            .bind(playlist_id)
            .bind(media_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn deactivate_playlist(&self, id: Uuid, owner: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE playlists SET is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND created_by = $2 AND creator_type = 'user' AND is_active
            "#,
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upsert a watch position. The first transition into `is_completed`
    /// counts as one view on the media.
    pub async fn record_watch(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        position_seconds: i32,
        is_completed: bool,
    ) -> Result<WatchHistoryEntry, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let was_completed: Option<bool> = sqlx::query_scalar(
                    r#"
                    SELECT is_completed FROM watching_history
                    WHERE user_id = $1 AND media_id = $2
                    FOR UPDATE
                    "#,
                )
                .bind(user_id)
                .bind(media_id)
                .fetch_optional(&mut **tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO watching_history (
                        id, user_id, media_id, last_watched_position_seconds, is_completed, last_watched_at
                    )
                    VALUES ($1, $2, $3, $4, $5, NOW())
                    ON CONFLICT (user_id, media_id) DO UPDATE SET
                        last_watched_position_seconds = EXCLUDED.last_watched_position_seconds,
                        is_completed = EXCLUDED.is_completed,
                        last_watched_at = NOW()
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(media_id)
                .bind(position_seconds)
                .bind(is_completed)
                .execute(&mut **tx)
                .await?;

                if is_completed && !was_completed.unwrap_or(false) {
                    sqlx::query("UPDATE media SET views = views + 1 WHERE id = $1")
                        .bind(media_id)
                        .execute(&mut **tx)
                        .await?;
                }

                let entry = sqlx::query_as::<_, WatchHistoryEntry>(
                    r#"
                    SELECT h.id, h.user_id, h.media_id, m.title, m.thumbnail_url,
                           h.last_watched_position_seconds, h.is_completed, h.last_watched_at
                    FROM watching_history h
                    JOIN media m ON m.id = h.media_id
                    WHERE h.user_id = $1 AND h.media_id = $2
                    "#,
                )
                .bind(user_id)
                .bind(media_id)
                .fetch_one(&mut **tx)
                .await?;

                Ok(entry)
            })
        })
        .await
    }

    pub async fn list_history(&self, user_id: Uuid) -> Result<Vec<WatchHistoryEntry>, AppError> {
        let rows = sqlx::query_as::<_, WatchHistoryEntry>(
            r#"
            SELECT h.id, h.user_id, h.media_id, m.title, m.thumbnail_url,
                   h.last_watched_position_seconds, h.is_completed, h.last_watched_at
            FROM watching_history h
            JOIN media m ON m.id = h.media_id
            WHERE h.user_id = $1 AND m.is_active
            ORDER BY h.last_watched_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Idempotent add.
    pub async fn add_bookmark(
        &self,
        list: BookmarkList,
        user_id: Uuid,
        media_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (user_id, media_id) VALUES ($1, $2)
            ON CONFLICT (user_id, media_id) DO NOTHING
            "#,
            list.table()
        ))
        .bind(user_id)
        .bind(media_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_bookmark(
        &self,
        list: BookmarkList,
        user_id: Uuid,
        media_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND media_id = $2",
            list.table()
        ))
        .bind(user_id)
        .bind(media_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_bookmarks(
        &self,
        list: BookmarkList,
        user_id: Uuid,
    ) -> Result<Vec<Bookmark>, AppError> {
        let rows = sqlx::query_as::<_, Bookmark>(&format!(
            r#"
            SELECT b.media_id, m.title, m.thumbnail_url, b.created_at
            FROM {} b
            JOIN media m ON m.id = b.media_id
            WHERE b.user_id = $1 AND m.is_active
            ORDER BY b.created_at DESC
            "#,
            list.table()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Record a download grant, replacing the URL and expiry of an earlier grant
    /// for the same (user, media, variant).
    pub async fn upsert_download(
        &self,
        user_id: Uuid,
        media_id: Uuid,
        variant_id: Uuid,
        signed_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Download, AppError> {
        let row = sqlx::query_as::<_, Download>(&format!(
            r#"
            INSERT INTO downloads (id, user_id, media_id, variant_id, signed_url, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, media_id, variant_id) DO UPDATE SET
                signed_url = EXCLUDED.signed_url,
                expires_at = EXCLUDED.expires_at,
                is_deleted = FALSE,
                updated_at = NOW()
            RETURNING {}
            "#,
            DOWNLOAD_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(media_id)
        .bind(variant_id)
        .bind(signed_url)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Grants that are neither deleted nor expired.
    pub async fn list_downloads(&self, user_id: Uuid) -> Result<Vec<Download>, AppError> {
        let rows = sqlx::query_as::<_, Download>(&format!(
            r#"
            SELECT {} FROM downloads
            WHERE user_id = $1 AND NOT is_deleted AND expires_at > NOW()
            ORDER BY updated_at DESC
            "#,
            DOWNLOAD_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_download(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE downloads SET is_deleted = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
