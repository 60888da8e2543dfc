//! OpenAPI documentation for the media endpoints.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use streamhub_core::models;

/// Returns the OpenAPI document served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StreamHub API",
        version = "0.1.0",
        description = "Streaming platform backend: multipart media upload, HLS transcoding, signed playback and download URLs. Every response uses the {success, message, code, data} envelope."
    ),
    paths(
        // Upload
        handlers::media::initiate_upload,
        handlers::media::presigned_urls,
        handlers::media::complete_upload,
        handlers::media::abort_upload,
        // Access
        handlers::media::media_access_url,
        handlers::media::list_media,
        handlers::media::get_media,
        // Owner edits
        handlers::media::update_media,
        handlers::media::delete_media,
        handlers::media::initiate_thumbnail,
        handlers::media::confirm_thumbnail,
    ),
    components(
        schemas(
            models::Media,
            models::MediaVariant,
            models::MediaWithVariants,
            models::MediaType,
            models::Visibility,
            models::UploaderType,
            models::TranscodingStatus,
            models::Resolution,
            models::StreamFormat,
            models::StringList,
            models::MediaMetadata,
            models::InitiateUploadRequest,
            models::InitiateUploadResponse,
            models::PartUrlsRequest,
            models::PartUrl,
            models::CompletedPart,
            models::CompleteUploadRequest,
            models::AbortUploadRequest,
            models::AccessUrlRequest,
            models::SignedAccess,
            models::UpdateMediaRequest,
            models::ThumbnailUploadRequest,
            models::ThumbnailUploadResponse,
            models::ConfirmThumbnailRequest,
            // Error
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "media", description = "Upload, transcoding status, signed access and metadata of media")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_media_paths_and_bearer_scheme() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/v1/media/complete-upload"));
        assert!(spec.paths.paths.contains_key("/api/v1/media/{id}"));
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
