use crate::auth::models::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use streamhub_core::models::{
    sort_for_listing, CreateArtistRequest, UpdateArtistRequest, UploaderType,
};
use streamhub_core::{AppError, Capability, Role};
use streamhub_db::{with_transaction, ArtistPatch, NewArtist};
use uuid::Uuid;

const ARTIST_NOT_FOUND: &str = "Artist not found";
const NAME_TAKEN: &str = "Artist name is already taken";

fn social_links_json(links: std::collections::HashMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        links
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect(),
    )
}

/// Creates the caller's artist profile and promotes them to the artist role.
#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, operation = "create_artist"))]
pub async fn create_artist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateArtistRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    auth_user.require(Capability::CreateArtistProfile)?;
    if state.db.artists.name_taken(&request.name, None).await? {
        return Err(AppError::Conflict(NAME_TAKEN.to_string()).into());
    }

    let artists = state.db.artists.clone();
    let users = state.db.users.clone();
    let user_id = auth_user.user_id;
    let new_artist = NewArtist {
        user_id,
        name: request.name,
        bio: request.bio,
        profile_picture: request.profile_picture,
        social_links: social_links_json(request.social_links),
        genres: request.genres,
    };

    let artist = with_transaction(&state.db.pool, move |tx| {
        Box::pin(async move {
            if artists.find_by_user_tx(tx, user_id).await?.is_some() {
                return Err(AppError::Conflict(
                    "You already have an artist profile".to_string(),
                ));
            }
            let artist = artists.create_tx(tx, new_artist).await?;
            users.set_role_tx(tx, user_id, Role::Artist).await?;
            Ok(artist)
        })
    })
    .await?;

    tracing::info!(artist_id = %artist.id, "Artist profile created");
    Ok(ApiResponse::created("Artist created", artist))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn list_artists(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut artists = state
        .db
        .artists
        .list_summaries(Some(auth_user.user_id))
        .await?;
    sort_for_listing(&mut artists);
    Ok(ApiResponse::ok("Artists fetched", artists))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, artist_id = %id))]
pub async fn get_artist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let artist = state
        .db
        .artists
        .summary(id, Some(auth_user.user_id))
        .await?
        .ok_or_else(|| AppError::NotFound(ARTIST_NOT_FOUND.to_string()))?;
    Ok(ApiResponse::ok("Artist fetched", artist))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, artist_id = %id))]
pub async fn update_artist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateArtistRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if let Some(name) = &request.name {
        if state.db.artists.name_taken(name, Some(id)).await? {
            return Err(AppError::Conflict(NAME_TAKEN.to_string()).into());
        }
    }

    let patch = ArtistPatch {
        name: request.name,
        bio: request.bio,
        profile_picture: request.profile_picture,
        social_links: request.social_links.map(social_links_json),
        genres: request.genres,
    };
    let artist = state
        .db
        .artists
        .update(id, auth_user.user_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Artist not found or unauthorized".to_string()))?;
    Ok(ApiResponse::ok("Artist updated", artist))
}

/// Retires the caller's profile, hides their artist uploads and reverts the role.
#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, artist_id = %id, operation = "delete_artist"))]
pub async fn delete_artist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let artists = state.db.artists.clone();
    let media = state.db.media.clone();
    let users = state.db.users.clone();
    let user_id = auth_user.user_id;

    let hidden = with_transaction(&state.db.pool, move |tx| {
        Box::pin(async move {
            let artist = artists
                .find_by_user_tx(tx, user_id)
                .await?
                .filter(|a| a.id == id)
                .ok_or_else(|| {
                    AppError::NotFound("Artist not found or unauthorized".to_string())
                })?;
            artists.deactivate_tx(tx, artist.id).await?;
            let hidden = media
                .deactivate_by_uploader_tx(tx, user_id, UploaderType::Artist)
                .await?;
            users.set_role_tx(tx, user_id, Role::User).await?;
            Ok(hidden)
        })
    })
    .await?;

    tracing::info!(media_hidden = hidden, "Artist profile deleted");
    Ok(ApiResponse::message("Artist deleted"))
}

async fn change_follow(state: &AppState, user_id: Uuid, artist_id: Uuid, follow: bool) -> Result<(), AppError> {
    state
        .db
        .artists
        .find_active(artist_id)
        .await?
        .ok_or_else(|| AppError::NotFound(ARTIST_NOT_FOUND.to_string()))?;

    let artists = state.db.artists.clone();
    with_transaction(&state.db.pool, move |tx| {
        Box::pin(async move {
            if follow {
                if !artists.follow_tx(tx, user_id, artist_id).await? {
                    return Err(AppError::Conflict(
                        "You are already following this artist".to_string(),
                    ));
                }
            } else if !artists.unfollow_tx(tx, user_id, artist_id).await? {
                return Err(AppError::Conflict(
                    "You are not following this artist".to_string(),
                ));
            }
            Ok(())
        })
    })
    .await
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, artist_id = %id))]
pub async fn follow_artist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    change_follow(&state, auth_user.user_id, id, true).await?;
    Ok(ApiResponse::message("Artist followed"))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, artist_id = %id))]
pub async fn unfollow_artist(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    change_follow(&state, auth_user.user_id, id, false).await?;
    Ok(ApiResponse::message("Artist unfollowed"))
}
