//! HS256 tokens: bearer session tokens and short-lived phone OTP tokens.

use super::otp::{code_digest, codes_match};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use streamhub_core::{AppError, Role};
use uuid::Uuid;

const PHONE_OTP_PURPOSE: &str = "phone_verification";

/// Claims of a bearer token. `sid` names the session row that logout deactivates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub sid: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of the token handed out by send-otp-phone. `otp` holds a keyed
/// digest of the code, never the code itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneOtpClaims {
    pub sub: Uuid,
    pub otp: String,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    role: Role,
    session_id: Uuid,
    expiry_days: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        role,
        sid: session_id,
        iat: now.timestamp(),
        exp: (now + Duration::days(expiry_days)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Bearer token rejected");
        AppError::Unauthorized("Invalid or expired token".to_string())
    })
}

pub fn issue_phone_otp_token(
    secret: &str,
    user_id: Uuid,
    code: &str,
    ttl_minutes: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = PhoneOtpClaims {
        sub: user_id,
        otp: code_digest(secret, &user_id.to_string(), code),
        purpose: PHONE_OTP_PURPOSE.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign OTP token: {}", e)))
}

/// Checks the token's signature, expiry, purpose and subject, then compares
/// the submitted code against the embedded digest in constant time.
pub fn verify_phone_otp(
    secret: &str,
    token: &str,
    user_id: Uuid,
    code: &str,
) -> Result<(), AppError> {
    let invalid = || AppError::BadRequest("Invalid or expired OTP".to_string());

    let claims = decode::<PhoneOtpClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation(),
    )
    .map_err(|_| invalid())?
    .claims;

    if claims.purpose != PHONE_OTP_PURPOSE || claims.sub != user_id {
        return Err(invalid());
    }

    let provided = code_digest(secret, &user_id.to_string(), code);
    if codes_match(&claims.otp, &provided) {
        Ok(())
    } else {
        Err(invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    #[test]
    fn bearer_token_round_trips_claims() {
        let user = Uuid::new_v4();
        let session = Uuid::new_v4();
        let token = issue_token(SECRET, user, Role::Artist, session, 7).unwrap();
        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.sid, session);
        assert_eq!(claims.role, Role::Artist);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
    }

    #[test]
    fn bearer_token_rejects_wrong_secret_and_expiry() {
        let token = issue_token(SECRET, Uuid::new_v4(), Role::User, Uuid::new_v4(), 7).unwrap();
        assert!(matches!(
            verify_token("another-secret", &token),
            Err(AppError::Unauthorized(_))
        ));

        let expired =
            issue_token(SECRET, Uuid::new_v4(), Role::User, Uuid::new_v4(), -1).unwrap();
        assert!(verify_token(SECRET, &expired).is_err());
    }

    #[test]
    fn phone_otp_token_verifies_only_the_right_code_and_user() {
        let user = Uuid::new_v4();
        let token = issue_phone_otp_token(SECRET, user, "482913", 10).unwrap();

        assert!(verify_phone_otp(SECRET, &token, user, "482913").is_ok());
        assert!(verify_phone_otp(SECRET, &token, user, "000000").is_err());
        assert!(verify_phone_otp(SECRET, &token, Uuid::new_v4(), "482913").is_err());
    }

    #[test]
    fn bearer_token_is_not_a_phone_otp_token() {
        let user = Uuid::new_v4();
        let token = issue_token(SECRET, user, Role::User, Uuid::new_v4(), 7).unwrap();
        assert!(verify_phone_otp(SECRET, &token, user, "123456").is_err());
    }
}
