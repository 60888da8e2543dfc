use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::role::Role;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub is_deleted: bool,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn can_sign_in(&self) -> bool {
        !self.is_deleted && !self.is_banned
    }
}

/// `Jane.Doe@example.com` -> `jane.doe`
pub fn username_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or(email)
        .trim()
        .to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "verification_purpose", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    EmailVerification,
    PasswordReset,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct VerificationCode {
    pub user_id: Uuid,
    pub purpose: VerificationPurpose,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Public view of an account returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            is_email_verified: user.is_email_verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthTokenResponse {
    pub user: UserSummary,
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 5))]
    pub country_code: Option<String>,
    #[validate(length(min = 4, max = 20))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyResetCodeRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(equal = 6))]
    pub otp: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyEmailRequest {
    pub user_id: Uuid,
    #[validate(length(equal = 6))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PhoneOtpRequest {
    #[validate(length(min = 1, max = 5))]
    pub country_code: String,
    #[validate(length(min = 4, max = 20))]
    pub phone_number: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PhoneOtpResponse {
    pub user_id: Uuid,
    pub otp_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPhoneRequest {
    pub user_id: Uuid,
    #[validate(length(equal = 6))]
    pub otp: String,
    #[validate(length(min = 1))]
    pub otp_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OAuthRequest {
    #[validate(length(min = 1))]
    pub id_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_lowercased_local_part() {
        assert_eq!(username_from_email("Jane.Doe@Example.com"), "jane.doe");
        assert_eq!(username_from_email("solo"), "solo");
    }

    #[test]
    fn code_expiry_is_inclusive() {
        let now = Utc::now();
        let code = VerificationCode {
            user_id: Uuid::new_v4(),
            purpose: VerificationPurpose::PasswordReset,
            code: "123456".to_string(),
            expires_at: now,
        };
        assert!(code.is_expired(now));
        assert!(!code.is_expired(now - chrono::Duration::seconds(1)));
    }
}
