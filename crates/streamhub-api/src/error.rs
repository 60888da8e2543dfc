//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Anything that
//! converts into `AppError` can be propagated with `?` and is rendered as the
//! error envelope `{success: false, message, code}` with the variant's status.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use streamhub_core::{AppError, ErrorMetadata, LogLevel};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    /// HTTP status code, repeated in the body.
    pub code: u16,
    /// Machine-readable error code for programmatic handling
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>, error_code: &str) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: status.as_u16(),
            error_code: error_code.to_string(),
            details: None,
            error_type: None,
        }
    }
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from streamhub-core)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

impl From<validator::ValidationErrors> for HttpAppError {
    fn from(err: validator::ValidationErrors) -> Self {
        HttpAppError(err.into())
    }
}

impl From<streamhub_storage::StorageError> for HttpAppError {
    fn from(err: streamhub_storage::StorageError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<streamhub_services::GatewayError> for HttpAppError {
    fn from(err: streamhub_services::GatewayError) -> Self {
        HttpAppError(err.into())
    }
}

impl From<streamhub_services::NotifyError> for HttpAppError {
    fn from(err: streamhub_services::NotifyError) -> Self {
        HttpAppError(err.into())
    }
}

/// Convert JSON body deserialization failures into a 400 with the error envelope.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        let body_text = rejection.body_text();
        let message = if body_text.contains("expected a formatted UUID")
            || body_text.contains("invalid type")
        {
            "Invalid request body: check that fields like media_id are UUID strings, not numbers."
                .to_string()
        } else {
            format!("Invalid request body: {}", body_text)
        };
        HttpAppError(AppError::InvalidInput(message))
    }
}

/// JSON body extractor that renders deserialization failures as the error envelope.
#[derive(Debug, Clone, Copy)]
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        Ok(AppJson(inner))
    }
}

/// Like [`AppJson`], then runs the body's `validator` rules before the handler sees it.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        inner.validate()?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error,
                error_type = error_type,
                details = %error.detailed_message(),
                "Error occurred"
            );
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

fn error_body(app_error: &AppError, status: StatusCode, is_production: bool) -> ErrorResponse {
    let mut body = ErrorResponse::new(status, app_error.client_message(), app_error.error_code());
    if !is_production && !app_error.is_sensitive() {
        body.details = Some(app_error.detailed_message());
        body.error_type = Some(app_error.error_type().to_string());
    }
    body
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = error_body(app_error, status, is_production_env());
        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = app_error {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_errors_never_carry_details() {
        let err = AppError::Storage("bucket policy denied for arn:aws:s3:::secret".into());
        let body = error_body(&err, StatusCode::INTERNAL_SERVER_ERROR, false);
        assert!(!body.success);
        assert_eq!(body.code, 500);
        assert_eq!(body.message, "Failed to access storage");
        assert!(body.details.is_none());
        assert!(body.error_type.is_none());
    }

    #[test]
    fn client_errors_carry_details_outside_production() {
        let err = AppError::NotFound("Media not found".into());
        let dev = error_body(&err, StatusCode::NOT_FOUND, false);
        assert_eq!(dev.message, "Media not found");
        assert_eq!(dev.error_code, "NOT_FOUND");
        assert_eq!(dev.error_type.as_deref(), Some("NotFound"));

        let prod = error_body(&err, StatusCode::NOT_FOUND, true);
        assert!(prod.details.is_none());
    }

    #[test]
    fn still_processing_renders_as_bad_request() {
        let response =
            HttpAppError(AppError::StillProcessing("Media is still being processed".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = HttpAppError(AppError::RateLimited {
            retry_after_secs: 42,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");
    }
}
