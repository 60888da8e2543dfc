//! Account endpoints: registration, password login, one-time codes, OAuth
//! sign-in and logout.

use crate::auth::jwt::{issue_phone_otp_token, issue_token, verify_phone_otp};
use crate::auth::models::AuthUser;
use crate::auth::otp::{codes_match, generate_code};
use crate::auth::password::{hash_password, verify_password};
use crate::constants::{EMAIL_CODE_TTL_MINUTES, PHONE_OTP_TTL_MINUTES};
use crate::error::{HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::utils::ip_extraction::RequestMeta;
use axum::{extract::State, response::IntoResponse};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use streamhub_core::models::{
    username_from_email, AuthTokenResponse, EmailRequest, LoginRequest, OAuthRequest,
    PhoneOtpRequest, PhoneOtpResponse, RegisterRequest, ResetPasswordRequest, User, UserSummary,
    VerificationPurpose, VerifyEmailRequest, VerifyPhoneRequest, VerifyResetCodeRequest,
};
use streamhub_core::{AppError, Role};
use streamhub_db::NewUser;
use streamhub_services::{templates, IdentityProvider};
use utoipa::ToSchema;
use uuid::Uuid;

const INVALID_CREDENTIALS: &str = "Invalid email or password.";
const INVALID_OTP: &str = "Invalid or expired OTP";

/// Returned instead of a token while the email is unverified.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingVerification {
    pub user_id: Uuid,
    pub email: String,
    pub requires_verification: bool,
}

impl From<&User> for PendingVerification {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            requires_verification: true,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn find_account(state: &AppState, email: &str) -> Result<User, AppError> {
    state
        .db
        .users
        .find_by_email(&normalize_email(email))
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Stores a fresh code for `purpose`, replacing any previous one, and emails it.
async fn send_email_code(
    state: &AppState,
    user: &User,
    purpose: VerificationPurpose,
) -> Result<(), AppError> {
    let code = generate_code();
    let expires_at = Utc::now() + Duration::minutes(EMAIL_CODE_TTL_MINUTES);
    state
        .db
        .verification_codes
        .store(user.id, purpose, &code, expires_at)
        .await?;

    let (subject, body) = match purpose {
        VerificationPurpose::EmailVerification => templates::email_verification(&code),
        VerificationPurpose::PasswordReset => templates::password_reset(&code),
    };
    state.auth.notifier.send_email(&user.email, &subject, &body).await?;
    tracing::debug!(user_id = %user.id, purpose = ?purpose, "Verification code sent");
    Ok(())
}

/// Checks a submitted code. An expired code is replaced by a new one that is
/// sent right away, and the attempt still fails.
async fn check_email_code(
    state: &AppState,
    user: &User,
    purpose: VerificationPurpose,
    submitted: &str,
) -> Result<(), AppError> {
    let stored = state
        .db
        .verification_codes
        .find(user.id, purpose)
        .await?
        .ok_or_else(|| AppError::BadRequest(INVALID_OTP.to_string()))?;

    if stored.is_expired(Utc::now()) {
        send_email_code(state, user, purpose).await?;
        return Err(AppError::BadRequest(
            "OTP has expired. A new code has been sent.".to_string(),
        ));
    }
    if !codes_match(&stored.code, submitted) {
        return Err(AppError::BadRequest(INVALID_OTP.to_string()));
    }
    Ok(())
}

async fn start_session(
    state: &AppState,
    user: &User,
    meta: RequestMeta,
) -> Result<AuthTokenResponse, AppError> {
    let session = state
        .db
        .sessions
        .create(user.id, Some(meta.ip), meta.user_agent)
        .await?;
    let token = issue_token(
        &state.auth.jwt_secret,
        user.id,
        user.role,
        session.id,
        state.auth.jwt_expiry_days,
    )?;
    Ok(AuthTokenResponse {
        user: UserSummary::from(user),
        token,
    })
}

#[tracing::instrument(skip(state, request), fields(operation = "register"))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let email = normalize_email(&request.email);

    if let Some(existing) = state.db.users.find_by_email(&email).await? {
        if existing.is_email_verified || existing.is_deleted {
            return Err(AppError::Conflict("Email is already registered".to_string()).into());
        }
        send_email_code(&state, &existing, VerificationPurpose::EmailVerification).await?;
        return Ok(ApiResponse::ok(
            "Account exists but is not verified. A new verification code has been sent.",
            PendingVerification::from(&existing),
        ));
    }

    let user = state
        .db
        .users
        .create(NewUser {
            username: username_from_email(&email),
            email,
            password_hash: Some(hash_password(&request.password)?),
            role: Role::User,
            country_code: request.country_code,
            phone_number: request.phone_number,
            is_email_verified: false,
            first_name: None,
            last_name: None,
        })
        .await?;

    send_email_code(&state, &user, VerificationPurpose::EmailVerification).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok(ApiResponse::created(
        "User registered. A verification code has been sent to your email.",
        PendingVerification::from(&user),
    ))
}

#[tracing::instrument(skip(state, meta, request), fields(operation = "login"))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<axum::response::Response, HttpAppError> {
    let invalid = || AppError::Unauthorized(INVALID_CREDENTIALS.to_string());

    let user = state
        .db
        .users
        .find_by_email(&normalize_email(&request.email))
        .await?
        .filter(User::can_sign_in)
        .ok_or_else(invalid)?;

    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&request.password, hash)? {
        return Err(invalid().into());
    }

    if !user.is_email_verified {
        send_email_code(&state, &user, VerificationPurpose::EmailVerification).await?;
        return Ok(ApiResponse::ok(
            "Email not verified. A new verification code has been sent.",
            PendingVerification::from(&user),
        )
        .into_response());
    }

    let auth = start_session(&state, &user, meta).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(ApiResponse::ok("Login successful", auth).into_response())
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, operation = "logout"))]
pub async fn logout(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .db
        .sessions
        .deactivate(auth_user.session_id, auth_user.user_id)
        .await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

#[tracing::instrument(skip(state, request), fields(operation = "forgot_password"))]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = find_account(&state, &request.email).await?;
    send_email_code(&state, &user, VerificationPurpose::PasswordReset).await?;
    Ok(ApiResponse::message("Password reset code sent to your email"))
}

#[tracing::instrument(skip(state, request), fields(operation = "verify_reset_code"))]
pub async fn verify_forgot_password_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<VerifyResetCodeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = find_account(&state, &request.email).await?;
    check_email_code(&state, &user, VerificationPurpose::PasswordReset, &request.otp).await?;
    Ok(ApiResponse::message("OTP verified"))
}

#[tracing::instrument(skip(state, request), fields(operation = "reset_password"))]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = find_account(&state, &request.email).await?;
    check_email_code(&state, &user, VerificationPurpose::PasswordReset, &request.otp).await?;

    let hash = hash_password(&request.new_password)?;
    state.db.users.update_password(user.id, &hash).await?;
    state
        .db
        .verification_codes
        .consume(user.id, VerificationPurpose::PasswordReset)
        .await?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(ApiResponse::message("Password has been reset"))
}

#[tracing::instrument(skip(state, request), fields(operation = "send_otp_email"))]
pub async fn send_otp_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<EmailRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = find_account(&state, &request.email).await?;
    if user.is_email_verified {
        return Err(AppError::BadRequest("Email already verified".to_string()).into());
    }
    send_email_code(&state, &user, VerificationPurpose::EmailVerification).await?;
    Ok(ApiResponse::message("Verification code sent"))
}

#[tracing::instrument(skip(state, meta, request), fields(user_id = %request.user_id, operation = "verify_email"))]
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(request): ValidatedJson<VerifyEmailRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = state
        .db
        .users
        .find_by_id(request.user_id)
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_email_verified {
        return Err(AppError::BadRequest("Email already verified".to_string()).into());
    }
    check_email_code(&state, &user, VerificationPurpose::EmailVerification, &request.otp).await?;

    state
        .db
        .verification_codes
        .consume(user.id, VerificationPurpose::EmailVerification)
        .await?;
    let user = state.db.users.mark_email_verified(user.id).await?;

    let auth = start_session(&state, &user, meta).await?;
    tracing::info!(user_id = %user.id, "Email verified");
    Ok(ApiResponse::ok("Email verified", auth))
}

/// `+44` or `44` followed by the local number.
fn international_number(country_code: &str, phone_number: &str) -> String {
    let code = country_code.trim().trim_start_matches('+');
    format!("+{}{}", code, phone_number.trim())
}

#[tracing::instrument(skip(state, request), fields(operation = "send_otp_phone"))]
pub async fn send_otp_phone(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PhoneOtpRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = state
        .db
        .users
        .find_by_phone(&request.country_code, &request.phone_number)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if user.is_phone_verified {
        return Err(AppError::BadRequest("Phone already verified".to_string()).into());
    }

    let code = generate_code();
    let otp_token =
        issue_phone_otp_token(&state.auth.jwt_secret, user.id, &code, PHONE_OTP_TTL_MINUTES)?;
    state
        .auth
        .notifier
        .send_sms(
            &international_number(&request.country_code, &request.phone_number),
            &templates::phone_verification(&code),
        )
        .await?;

    Ok(ApiResponse::ok(
        "OTP sent to your phone",
        PhoneOtpResponse {
            user_id: user.id,
            otp_token,
        },
    ))
}

#[tracing::instrument(skip(state, request), fields(user_id = %request.user_id, operation = "verify_phone"))]
pub async fn verify_phone(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<VerifyPhoneRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    verify_phone_otp(
        &state.auth.jwt_secret,
        &request.otp_token,
        request.user_id,
        &request.otp,
    )?;

    let user = state
        .db
        .users
        .find_by_id(request.user_id)
        .await?
        .filter(|u| !u.is_deleted)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if user.is_phone_verified {
        return Err(AppError::BadRequest("Phone already verified".to_string()).into());
    }

    let user = state.db.users.mark_phone_verified(user.id).await?;
    Ok(ApiResponse::ok("Phone verified", UserSummary::from(&user)))
}

async fn oauth_sign_in(
    state: &AppState,
    provider: IdentityProvider,
    id_token: &str,
    meta: RequestMeta,
) -> Result<AuthTokenResponse, AppError> {
    let identity = state.auth.identity.verify(provider, id_token).await?;
    let email = identity
        .email
        .as_deref()
        .map(normalize_email)
        .ok_or_else(|| {
            AppError::BadRequest(format!("{} account has no email address", provider.name()))
        })?;

    let user = match state.db.users.find_by_email(&email).await? {
        Some(user) if !user.can_sign_in() => {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
        Some(user) if !user.is_email_verified => state.db.users.mark_email_verified(user.id).await?,
        Some(user) => user,
        None => {
            let user = state
                .db
                .users
                .create(NewUser {
                    username: username_from_email(&email),
                    email,
                    password_hash: None,
                    role: Role::User,
                    country_code: None,
                    phone_number: None,
                    is_email_verified: true,
                    first_name: identity.given_name.clone(),
                    last_name: identity.family_name.clone(),
                })
                .await?;
            tracing::info!(user_id = %user.id, provider = provider.name(), "User created from OAuth sign-in");
            user
        }
    };

    start_session(state, &user, meta).await
}

#[tracing::instrument(skip(state, meta, request), fields(operation = "oauth_google"))]
pub async fn oauth_google(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(request): ValidatedJson<OAuthRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let auth = oauth_sign_in(&state, IdentityProvider::Google, &request.id_token, meta).await?;
    Ok(ApiResponse::ok("Login successful", auth))
}

#[tracing::instrument(skip(state, meta, request), fields(operation = "oauth_apple"))]
pub async fn oauth_apple(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    ValidatedJson(request): ValidatedJson<OAuthRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let auth = oauth_sign_in(&state, IdentityProvider::Apple, &request.id_token, meta).await?;
    Ok(ApiResponse::ok("Login successful", auth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_number_has_a_single_plus() {
        assert_eq!(international_number("+44", "7700900123"), "+447700900123");
        assert_eq!(international_number("1", " 5551234567 "), "+15551234567");
    }

    #[test]
    fn emails_are_compared_lowercased() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }
}
