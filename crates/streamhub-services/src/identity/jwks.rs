//! RS256 id token verification against a provider's JWKS, with key caching.

use super::{IdentityError, IdentityProvider, IdentityVerifier, VerifiedIdentity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];
pub const APPLE_JWKS_URL: &str = "https://appleid.apple.com/auth/keys";
pub const APPLE_ISSUERS: &[&str] = &["https://appleid.apple.com"];

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    expires_at: DateTime<Utc>,
}

/// Google sends `email_verified` as a bool, Apple as the string `"true"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<Flag>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

/// One provider's key set: where to fetch it, who issues tokens, and which
/// audiences (client ids) are accepted.
pub struct JwksKeySet {
    jwks_url: String,
    issuers: Vec<String>,
    audiences: Vec<String>,
    http: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CachedKey>>>,
    cache_ttl_seconds: i64,
}

impl JwksKeySet {
    pub fn new(jwks_url: &str, issuers: &[&str], audiences: Vec<String>) -> Self {
        Self {
            jwks_url: jwks_url.to_string(),
            issuers: issuers.iter().map(|s| s.to_string()).collect(),
            audiences,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl_seconds: 3600,
        }
    }

    fn is_configured(&self) -> bool {
        !self.audiences.is_empty()
    }

    async fn fetch_jwks(&self) -> Result<Jwks, IdentityError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::KeysUnavailable(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(IdentityError::KeysUnavailable(format!(
                "JWKS endpoint returned error: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::KeysUnavailable(format!("Failed to parse JWKS: {}", e)))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(kid) {
                if cached.expires_at > Utc::now() {
                    return Ok(cached.key.clone());
                }
            }
        }

        // Miss or expired: refresh the whole set, providers rotate keys together.
        let jwks = self.fetch_jwks().await?;
        let expires_at = Utc::now() + chrono::Duration::seconds(self.cache_ttl_seconds);
        let mut found = None;
        {
            let mut cache = self.cache.write().await;
            cache.clear();
            for jwk in jwks.keys.iter().filter(|k| k.kty == "RSA") {
                let (Some(id), Some(n), Some(e)) = (&jwk.kid, &jwk.n, &jwk.e) else {
                    continue;
                };
                let Ok(key) = DecodingKey::from_rsa_components(n, e) else {
                    tracing::warn!(kid = %id, "Skipping malformed RSA key in JWKS");
                    continue;
                };
                if id == kid {
                    found = Some(key.clone());
                }
                cache.insert(id.clone(), CachedKey { key, expires_at });
            }
        }

        found.ok_or_else(|| IdentityError::InvalidToken(format!("Key ID {} not found in JWKS", kid)))
    }

    pub async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let header = decode_header(id_token)
            .map_err(|e| IdentityError::InvalidToken(format!("Invalid token header: {}", e)))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::InvalidToken(format!(
                "Unsupported algorithm: {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("Token header has no kid".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&self.issuers);
        validation.set_audience(&self.audiences);
        validation.validate_exp = true;

        let data = decode::<IdTokenClaims>(id_token, &key, &validation).map_err(|e| {
            tracing::debug!("Id token validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    IdentityError::InvalidToken("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    IdentityError::InvalidToken("Invalid token issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    IdentityError::InvalidToken("Invalid token audience".to_string())
                }
                _ => IdentityError::InvalidToken("Invalid or expired token".to_string()),
            }
        })?;

        let claims = data.claims;
        Ok(VerifiedIdentity {
            subject: claims.sub,
            email: claims.email.map(|e| e.to_lowercase()),
            email_verified: claims.email_verified.map(|f| f.is_set()).unwrap_or(false),
            given_name: claims.given_name,
            family_name: claims.family_name,
            picture: claims.picture,
        })
    }
}

/// Verifier for both supported providers.
pub struct JwksIdentityVerifier {
    google: JwksKeySet,
    apple: JwksKeySet,
}

impl JwksIdentityVerifier {
    pub fn new(google_client_ids: Vec<String>, apple_client_ids: Vec<String>) -> Self {
        Self {
            google: JwksKeySet::new(GOOGLE_JWKS_URL, GOOGLE_ISSUERS, google_client_ids),
            apple: JwksKeySet::new(APPLE_JWKS_URL, APPLE_ISSUERS, apple_client_ids),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwksIdentityVerifier {
    async fn verify(
        &self,
        provider: IdentityProvider,
        id_token: &str,
    ) -> Result<VerifiedIdentity, IdentityError> {
        let key_set = match provider {
            IdentityProvider::Google => &self.google,
            IdentityProvider::Apple => &self.apple,
        };
        if !key_set.is_configured() {
            return Err(IdentityError::NotConfigured(provider.name()));
        }
        key_set.verify(id_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_verified_accepts_bool_and_string_forms() {
        let google: IdTokenClaims =
            serde_json::from_str(r#"{"sub":"1","email":"a@b.c","email_verified":true}"#).unwrap();
        let apple: IdTokenClaims =
            serde_json::from_str(r#"{"sub":"2","email":"a@b.c","email_verified":"true"}"#).unwrap();
        let missing: IdTokenClaims = serde_json::from_str(r#"{"sub":"3"}"#).unwrap();
        assert!(google.email_verified.unwrap().is_set());
        assert!(apple.email_verified.unwrap().is_set());
        assert!(missing.email_verified.is_none());
    }

    #[tokio::test]
    async fn unconfigured_provider_is_rejected_before_any_fetch() {
        let verifier = JwksIdentityVerifier::new(vec![], vec![]);
        let err = verifier
            .verify(IdentityProvider::Apple, "a.b.c")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::NotConfigured("Apple")));
    }

    #[tokio::test]
    async fn malformed_token_fails_on_the_header() {
        let verifier = JwksIdentityVerifier::new(vec!["client".into()], vec![]);
        let err = verifier
            .verify(IdentityProvider::Google, "not-a-jwt")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken(_)));
    }
}
