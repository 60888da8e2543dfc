//! API path constants.

/// API base path prefix (version-independent)
pub const API_BASE: &str = "/api";

/// Prefix every resource router is nested under.
pub const API_PREFIX: &str = "/api/v1";

/// Lifetime of presigned part, access and thumbnail URLs.
pub const SIGNED_URL_TTL_SECS: u64 = 60 * 60;

/// Lifetime of an offline download grant.
pub const DOWNLOAD_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Lifetime of emailed verification and reset codes.
pub const EMAIL_CODE_TTL_MINUTES: i64 = 5;

/// Lifetime of the signed token carrying a phone OTP.
pub const PHONE_OTP_TTL_MINUTES: i64 = 10;

/// Largest accepted JSON body. Media bytes never pass through the API.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Failed authentications allowed per client IP within the window below.
pub const AUTH_FAILURE_LIMIT: u32 = 10;
pub const AUTH_FAILURE_WINDOW_SECS: u64 = 15 * 60;
