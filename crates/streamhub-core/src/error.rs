//! Error types module
//!
//! All failures that can cross a service boundary are unified under `AppError`.
//! Each variant self-describes how it is presented over HTTP through the
//! `ErrorMetadata` trait, so handlers never pick status codes by hand.
//!
//! The `Database` variant carries the `sqlx` error when the `sqlx` feature is on.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable or caller-driven issues
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "DATABASE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether the client may retry the same request later
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from the client
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transcode service error: {0}")]
    Transcode(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Still processing: {0}")]
    StillProcessing(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Too many requests: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(err: &AppError) -> (u16, &'static str, bool, bool, LogLevel) {
    match err {
        AppError::Database(_) => (500, "DATABASE_ERROR", true, true, LogLevel::Error),
        AppError::Storage(_) => (500, "STORAGE_ERROR", true, true, LogLevel::Error),
        AppError::Transcode(_) => (500, "TRANSCODE_ERROR", true, true, LogLevel::Error),
        AppError::PaymentGateway(_) => (502, "PAYMENT_GATEWAY_ERROR", true, true, LogLevel::Error),
        AppError::Notification(_) => (502, "NOTIFICATION_ERROR", true, true, LogLevel::Error),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, false, LogLevel::Debug),
        AppError::BadRequest(_) => (400, "BAD_REQUEST", false, false, LogLevel::Debug),
        AppError::NotFound(_) => (404, "NOT_FOUND", false, false, LogLevel::Debug),
        AppError::Unauthorized(_) => (401, "UNAUTHORIZED", false, false, LogLevel::Debug),
        AppError::Forbidden(_) => (403, "FORBIDDEN", false, false, LogLevel::Warn),
        AppError::Conflict(_) => (409, "CONFLICT", false, false, LogLevel::Debug),
        AppError::StillProcessing(_) => (400, "STILL_PROCESSING", true, false, LogLevel::Debug),
        AppError::ProcessingFailed(_) => (422, "PROCESSING_FAILED", false, false, LogLevel::Warn),
        AppError::RateLimited { .. } => (429, "RATE_LIMITED", true, false, LogLevel::Warn),
        AppError::Internal(_) => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
        AppError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", true, true, LogLevel::Error),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Transcode(_) => "Transcode",
            AppError::PaymentGateway(_) => "PaymentGateway",
            AppError::Notification(_) => "Notification",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Conflict(_) => "Conflict",
            AppError::StillProcessing(_) => "StillProcessing",
            AppError::ProcessingFailed(_) => "ProcessingFailed",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }

    /// True when a `sqlx` unique-constraint violation caused this error.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            AppError::Database(SqlxError::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }

    /// Map a unique-constraint violation to `Conflict(message)`, leaving other errors as-is.
    pub fn conflict_on_unique(self, message: &str) -> AppError {
        if self.is_unique_violation() {
            AppError::Conflict(message.to_string())
        } else {
            self
        }
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Transcode(_) => "Failed to reach the transcoding service".to_string(),
            AppError::PaymentGateway(_) => "Payment processing error".to_string(),
            AppError::Notification(_) => "Failed to deliver notification".to_string(),
            AppError::InvalidInput(ref msg)
            | AppError::BadRequest(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::Unauthorized(ref msg)
            | AppError::Forbidden(ref msg)
            | AppError::Conflict(ref msg)
            | AppError::StillProcessing(ref msg)
            | AppError::ProcessingFailed(ref msg) => msg.clone(),
            AppError::RateLimited { retry_after_secs } => format!(
                "Too many requests, please try again in {} seconds",
                retry_after_secs
            ),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_not_found_passes_message_through() {
        let err = AppError::NotFound("Media not found or unauthorized".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.client_message(), "Media not found or unauthorized");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_still_processing_is_retryable_bad_request() {
        let err = AppError::StillProcessing("check back shortly".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert!(err.is_recoverable());

        let failed = AppError::ProcessingFailed("transcoding failed".to_string());
        assert_eq!(failed.http_status_code(), 422);
        assert!(!failed.is_recoverable());
    }

    #[test]
    fn test_sensitive_errors_hide_internal_text() {
        let err = AppError::Storage("bucket secret-bucket: AccessDenied".to_string());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("secret-bucket"));

        let gateway = AppError::PaymentGateway("sk_live_... rejected".to_string());
        assert_eq!(gateway.client_message(), "Payment processing error");
    }

    #[test]
    fn test_rate_limited_message_includes_retry_after() {
        let err = AppError::RateLimited {
            retry_after_secs: 42,
        };
        assert_eq!(err.http_status_code(), 429);
        assert!(err.client_message().contains("42"));
    }

    #[test]
    fn test_detailed_message_walks_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("outer"));
        assert!(err.detailed_message().contains("outer"));
    }
}
