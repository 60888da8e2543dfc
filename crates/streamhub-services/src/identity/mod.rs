//! Third-party sign-in: verification of Google and Apple id tokens.

#[cfg(feature = "oauth")]
pub mod jwks;

use async_trait::async_trait;
use streamhub_core::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid id token: {0}")]
    InvalidToken(String),

    #[error("Signing keys unavailable: {0}")]
    KeysUnavailable(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken(msg) => AppError::Unauthorized(msg),
            IdentityError::NotConfigured(provider) => {
                AppError::BadRequest(format!("{} sign-in is not enabled", provider))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityProvider {
    Google,
    Apple,
}

impl IdentityProvider {
    pub fn name(self) -> &'static str {
        match self {
            IdentityProvider::Google => "Google",
            IdentityProvider::Apple => "Apple",
        }
    }
}

/// Claims extracted from a verified id token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(
        &self,
        provider: IdentityProvider,
        id_token: &str,
    ) -> Result<VerifiedIdentity, IdentityError>;
}
