use crate::auth::models::AuthUser;
use crate::error::{AppJson, ErrorResponse, HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::services::catalog::MediaCatalog;
use crate::services::upload::UploadOrchestrator;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use std::sync::Arc;
use streamhub_core::models::{
    AbortUploadRequest, AccessUrlRequest, CompleteUploadRequest, ConfirmThumbnailRequest,
    InitiateUploadRequest, InitiateUploadResponse, Media, MediaListQuery, MediaWithVariants,
    PartUrl, PartUrlsRequest, SignedAccess, ThumbnailUploadRequest, ThumbnailUploadResponse,
    UpdateMediaRequest,
};
use streamhub_core::Capability;
use uuid::Uuid;

pub(crate) fn catalog(state: &AppState) -> MediaCatalog {
    MediaCatalog::new(
        state.media.storage.clone(),
        state.media.transcoder.clone(),
        state.db.media.clone(),
        state.db.variants.clone(),
        state.media.bucket_url.clone(),
    )
}

fn orchestrator(state: &AppState) -> UploadOrchestrator {
    UploadOrchestrator::new(
        state.media.storage.clone(),
        state.media.transcoder.clone(),
        state.db.media.clone(),
    )
}

/// Start a multipart upload of an original media file
#[utoipa::path(
    post,
    path = "/api/v1/media/initiate-upload",
    tag = "media",
    request_body = InitiateUploadRequest,
    responses(
        (status = 200, description = "Multipart upload started", body = InitiateUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, operation = "initiate_upload")
)]
pub async fn initiate_upload(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<InitiateUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    auth_user.require(Capability::UploadMedia)?;
    let session = orchestrator(&state)
        .initiate_upload(auth_user.user_id, &request.filename, &request.content_type)
        .await?;
    Ok(ApiResponse::ok("Upload initiated", session))
}

/// Presign one PUT URL per part of an open multipart upload
#[utoipa::path(
    post,
    path = "/api/v1/media/presigned-urls",
    tag = "media",
    request_body = PartUrlsRequest,
    responses(
        (status = 200, description = "Part URLs, valid for one hour", body = Vec<PartUrl>),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Multipart upload not found or unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, parts = request.parts, operation = "presign_parts")
)]
pub async fn presigned_urls(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PartUrlsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let urls = orchestrator(&state)
        .issue_part_urls(auth_user.user_id, &request.upload_id, &request.key, request.parts)
        .await?;
    Ok(ApiResponse::ok("Presigned URLs generated", urls))
}

/// Finish the multipart upload, record the media and start transcoding
#[utoipa::path(
    post,
    path = "/api/v1/media/complete-upload",
    tag = "media",
    request_body = CompleteUploadRequest,
    responses(
        (status = 201, description = "Media created, transcoding started", body = Media),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Multipart upload not found or unauthorized", body = ErrorResponse),
        (status = 500, description = "Storage or transcoder failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, key = %request.key, operation = "complete_upload")
)]
pub async fn complete_upload(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CompleteUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    auth_user.require(Capability::UploadMedia)?;
    let media = orchestrator(&state)
        .complete_upload(
            auth_user.user_id,
            auth_user.role,
            &request.upload_id,
            &request.key,
            request.parts,
            request.metadata,
        )
        .await?;
    Ok(ApiResponse::created("Upload completed, transcoding started", media))
}

/// Abort an open multipart upload
#[utoipa::path(
    post,
    path = "/api/v1/media/abort-upload",
    tag = "media",
    request_body = AbortUploadRequest,
    responses(
        (status = 200, description = "Upload aborted"),
        (status = 404, description = "Multipart upload not found or unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, operation = "abort_upload")
)]
pub async fn abort_upload(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<AbortUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    orchestrator(&state)
        .abort_upload(auth_user.user_id, &request.upload_id, &request.key)
        .await?;
    Ok(ApiResponse::message("Upload aborted"))
}

/// Signed GET URL for the original file or one rendition
#[utoipa::path(
    post,
    path = "/api/v1/media/media-access-url",
    tag = "media",
    request_body = AccessUrlRequest,
    responses(
        (status = 200, description = "Signed URL, valid for one hour", body = SignedAccess),
        (status = 404, description = "Media not found or unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, media_id = %request.media_id, operation = "media_access_url")
)]
pub async fn media_access_url(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<AccessUrlRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let access = catalog(&state)
        .issue_access_url(auth_user.user_id, request.media_id, request.resolution)
        .await?;
    Ok(ApiResponse::ok("Access URL generated", access))
}

/// List public media and the caller's own uploads
#[utoipa::path(
    get,
    path = "/api/v1/media/all",
    tag = "media",
    params(
        ("visibility" = Option<String>, Query, description = "public, private or unlisted"),
        ("type" = Option<String>, Query, description = "movie, music or podcast"),
        ("genres" = Option<String>, Query, description = "Comma-separated genres")
    ),
    responses(
        (status = 200, description = "Media list", body = Vec<Media>)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, query), fields(user_id = %auth_user.user_id, operation = "list_media"))]
pub async fn list_media(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<MediaListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media = catalog(&state).list_media(auth_user.user_id, query).await?;
    Ok(ApiResponse::ok("Media fetched", media))
}

/// Get one media record with its renditions, reconciling transcoding first
#[utoipa::path(
    get,
    path = "/api/v1/media/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Media ID")),
    responses(
        (status = 200, description = "Media with variants", body = MediaWithVariants),
        (status = 400, description = "Still processing", body = ErrorResponse),
        (status = 404, description = "Media not found", body = ErrorResponse),
        (status = 422, description = "Transcoding failed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, media_id = %id, operation = "get_media"))]
pub async fn get_media(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media = catalog(&state).get_media(auth_user.user_id, id).await?;
    Ok(ApiResponse::ok("Media fetched", media))
}

/// Edit metadata of an owned media record
#[utoipa::path(
    put,
    path = "/api/v1/media/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Media ID")),
    request_body = UpdateMediaRequest,
    responses(
        (status = 200, description = "Media updated", body = Media),
        (status = 404, description = "Media not found or unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, media_id = %id, operation = "update_media"))]
pub async fn update_media(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateMediaRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media = catalog(&state)
        .update_media(auth_user.user_id, id, request)
        .await?;
    Ok(ApiResponse::ok("Media updated", media))
}

/// Disable an owned media record and remove its original file
#[utoipa::path(
    delete,
    path = "/api/v1/media/{id}",
    tag = "media",
    params(("id" = Uuid, Path, description = "Media ID")),
    responses(
        (status = 200, description = "Media deleted"),
        (status = 404, description = "Media not found or unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, media_id = %id, operation = "delete_media"))]
pub async fn delete_media(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    catalog(&state).delete_media(auth_user.user_id, id).await?;
    Ok(ApiResponse::message("Media deleted"))
}

/// Presigned PUT for a thumbnail image
#[utoipa::path(
    post,
    path = "/api/v1/media/thumbnail/initiate",
    tag = "media",
    request_body = ThumbnailUploadRequest,
    responses(
        (status = 200, description = "Presigned thumbnail upload", body = ThumbnailUploadResponse),
        (status = 404, description = "Media not found or unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, media_id = %request.media_id, operation = "initiate_thumbnail")
)]
pub async fn initiate_thumbnail(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ThumbnailUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let upload = catalog(&state)
        .initiate_thumbnail_upload(
            auth_user.user_id,
            request.media_id,
            &request.filename,
            &request.content_type,
        )
        .await?;
    Ok(ApiResponse::ok("Thumbnail upload URL generated", upload))
}

/// Point the media's thumbnail at an uploaded object
#[utoipa::path(
    put,
    path = "/api/v1/media/{id}/thumbnail",
    tag = "media",
    params(("id" = Uuid, Path, description = "Media ID")),
    request_body = ConfirmThumbnailRequest,
    responses(
        (status = 200, description = "Thumbnail set", body = Media),
        (status = 400, description = "Key outside this media's thumbnail prefix", body = ErrorResponse),
        (status = 404, description = "Media not found or unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, media_id = %id, operation = "confirm_thumbnail"))]
pub async fn confirm_thumbnail(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ConfirmThumbnailRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let media = catalog(&state)
        .confirm_thumbnail(auth_user.user_id, id, &request.key)
        .await?;
    Ok(ApiResponse::ok("Thumbnail updated", media))
}
