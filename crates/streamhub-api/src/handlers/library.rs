//! Personal library: playlists, watch history, favourites, watch-later and
//! offline download grants.

use crate::auth::models::AuthUser;
use crate::constants::DOWNLOAD_TTL_SECS;
use crate::error::{AppJson, HttpAppError, ValidatedJson};
use crate::handlers::media::catalog;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use streamhub_core::models::{
    BookmarkRequest, CreatePlaylistRequest, DownloadRequest, Playlist, PlaylistMediaRequest,
    PlaylistWithItems, RecordWatchRequest, UpdatePlaylistRequest, Visibility,
};
use streamhub_core::{AppError, Capability};
use streamhub_db::BookmarkList;
use uuid::Uuid;

const PLAYLIST_NOT_FOUND: &str = "Playlist not found or unauthorized";

fn playlist_not_found() -> AppError {
    AppError::NotFound(PLAYLIST_NOT_FOUND.to_string())
}

async fn ensure_media_exists(state: &AppState, ids: &[Uuid]) -> Result<(), AppError> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    let found = state.db.library.count_active_media(&unique).await?;
    if found as usize != unique.len() {
        return Err(AppError::NotFound("Media not found".to_string()));
    }
    Ok(())
}

async fn modifiable_playlist(state: &AppState, id: Uuid, user_id: Uuid) -> Result<Playlist, AppError> {
    state
        .db
        .library
        .find_playlist(id)
        .await?
        .filter(|p| p.is_modifiable_by(user_id))
        .ok_or_else(playlist_not_found)
}

// ----- Playlists -----

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, operation = "create_playlist"))]
pub async fn create_playlist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreatePlaylistRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let visibility = request.visibility.unwrap_or(Visibility::Private);
    if visibility == Visibility::Public {
        auth_user.require(Capability::PublishPublicPlaylist)?;
    }
    if !request.media_ids.is_empty() {
        ensure_media_exists(&state, &request.media_ids).await?;
    }

    let playlist = state
        .db
        .library
        .create_playlist(
            auth_user.user_id,
            auth_user.role.creator_type(),
            request.name,
            request.description,
            visibility,
            request.media_ids,
        )
        .await?;
    tracing::info!(playlist_id = %playlist.id, "Playlist created");
    Ok(ApiResponse::created("Playlist created", playlist))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, operation = "list_playlists"))]
pub async fn list_playlists(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let playlists = state.db.library.list_playlists(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Playlists fetched", playlists))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, playlist_id = %id, operation = "get_playlist"))]
pub async fn get_playlist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let playlist = state
        .db
        .library
        .find_playlist(id)
        .await?
        .filter(|p| p.is_visible_to(auth_user.user_id))
        .ok_or_else(playlist_not_found)?;
    let items = state.db.library.playlist_items(playlist.id).await?;
    Ok(ApiResponse::ok(
        "Playlist fetched",
        PlaylistWithItems { playlist, items },
    ))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, playlist_id = %id, operation = "update_playlist"))]
pub async fn update_playlist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdatePlaylistRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if request.visibility == Some(Visibility::Public) {
        auth_user.require(Capability::PublishPublicPlaylist)?;
    }
    let playlist = state
        .db
        .library
        .update_playlist(
            id,
            auth_user.user_id,
            request.name,
            request.description,
            request.visibility,
        )
        .await?
        .ok_or_else(playlist_not_found)?;
    Ok(ApiResponse::ok("Playlist updated", playlist))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, playlist_id = %id, media_id = %request.media_id))]
pub async fn add_playlist_media(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<PlaylistMediaRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let playlist = modifiable_playlist(&state, id, auth_user.user_id).await?;
    ensure_media_exists(&state, &[request.media_id]).await?;

    let added = state
        .db
        .library
        .add_playlist_item(playlist.id, request.media_id)
        .await?;
    let message = if added {
        "Media added to playlist"
    } else {
        "Media already in playlist"
    };
    Ok(ApiResponse::message(message))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, playlist_id = %id, media_id = %request.media_id))]
pub async fn remove_playlist_media(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    AppJson(request): AppJson<PlaylistMediaRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let playlist = modifiable_playlist(&state, id, auth_user.user_id).await?;
    if !state
        .db
        .library
        .remove_playlist_item(playlist.id, request.media_id)
        .await?
    {
        return Err(AppError::NotFound("Media is not in this playlist".to_string()).into());
    }
    Ok(ApiResponse::message("Media removed from playlist"))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, playlist_id = %id, operation = "delete_playlist"))]
pub async fn delete_playlist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state
        .db
        .library
        .deactivate_playlist(id, auth_user.user_id)
        .await?
    {
        return Err(playlist_not_found().into());
    }
    Ok(ApiResponse::message("Playlist deleted"))
}

// ----- Watching history -----

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, media_id = %request.media_id))]
pub async fn record_watch(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RecordWatchRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    ensure_media_exists(&state, &[request.media_id]).await?;
    let entry = state
        .db
        .library
        .record_watch(
            auth_user.user_id,
            request.media_id,
            request.last_watched_position_seconds,
            request.is_completed,
        )
        .await?;
    Ok(ApiResponse::ok("Watching history updated", entry))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn list_history(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let history = state.db.library.list_history(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Watching history fetched", history))
}

// ----- Favourites and watch-later -----

async fn add_bookmark(
    state: &AppState,
    list: BookmarkList,
    user_id: Uuid,
    media_id: Uuid,
) -> Result<(), AppError> {
    ensure_media_exists(state, &[media_id]).await?;
    state.db.library.add_bookmark(list, user_id, media_id).await
}

async fn remove_bookmark(
    state: &AppState,
    list: BookmarkList,
    user_id: Uuid,
    media_id: Uuid,
) -> Result<(), AppError> {
    if state
        .db
        .library
        .remove_bookmark(list, user_id, media_id)
        .await?
    {
        Ok(())
    } else {
        Err(AppError::NotFound("Media is not in this list".to_string()))
    }
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, media_id = %request.media_id))]
pub async fn add_favourite(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<BookmarkRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    add_bookmark(&state, BookmarkList::Favourites, auth_user.user_id, request.media_id).await?;
    Ok(ApiResponse::message("Added to favourites"))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn list_favourites(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let items = state
        .db
        .library
        .list_bookmarks(BookmarkList::Favourites, auth_user.user_id)
        .await?;
    Ok(ApiResponse::ok("Favourites fetched", items))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, media_id = %media_id))]
pub async fn remove_favourite(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    remove_bookmark(&state, BookmarkList::Favourites, auth_user.user_id, media_id).await?;
    Ok(ApiResponse::message("Removed from favourites"))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, media_id = %request.media_id))]
pub async fn add_watch_later(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<BookmarkRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    add_bookmark(&state, BookmarkList::WatchLater, auth_user.user_id, request.media_id).await?;
    Ok(ApiResponse::message("Added to watch later"))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn list_watch_later(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let items = state
        .db
        .library
        .list_bookmarks(BookmarkList::WatchLater, auth_user.user_id)
        .await?;
    Ok(ApiResponse::ok("Watch later fetched", items))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, media_id = %media_id))]
pub async fn remove_watch_later(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    remove_bookmark(&state, BookmarkList::WatchLater, auth_user.user_id, media_id).await?;
    Ok(ApiResponse::message("Removed from watch later"))
}

// ----- Downloads -----

#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, media_id = %request.media_id, resolution = %request.resolution.as_str())
)]
pub async fn request_download(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<DownloadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ttl = Duration::from_secs(DOWNLOAD_TTL_SECS);
    let (variant, url) = catalog(&state)
        .sign_variant(auth_user.user_id, request.media_id, request.resolution, ttl)
        .await?;

    let expires_at = Utc::now() + chrono::Duration::seconds(DOWNLOAD_TTL_SECS as i64);
    let download = state
        .db
        .library
        .upsert_download(auth_user.user_id, variant.media_id, variant.id, &url, expires_at)
        .await?;
    tracing::info!(download_id = %download.id, "Download granted");
    Ok(ApiResponse::created("Download granted", download))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn list_downloads(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let downloads = state.db.library.list_downloads(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Downloads fetched", downloads))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, download_id = %id))]
pub async fn delete_download(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.library.delete_download(id, auth_user.user_id).await? {
        return Err(AppError::NotFound("Download not found".to_string()).into());
    }
    Ok(ApiResponse::message("Download removed"))
}
