use crate::auth::jwt::verify_token;
use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use crate::utils::ip_extraction::{client_ip_of, ClientIp};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamhub_core::AppError;
use streamhub_db::{SessionRepository, UserRepository};
use tokio::sync::Mutex;

/// Counts failed authentications per client IP and blocks an IP for the rest
/// of the window once it reaches `max_failures`.
#[derive(Clone)]
pub struct AuthFailureLimiter {
    inner: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_failures: u32,
    window: Duration,
}

impl AuthFailureLimiter {
    pub fn new(max_failures: u32, window_seconds: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            max_failures,
            window: Duration::from_secs(window_seconds),
        }
    }

    pub async fn record_failure(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let (count, reset_at) = guard
            .entry(ip.to_string())
            .or_insert((0, now + self.window));
        if now >= *reset_at {
            *count = 0;
            *reset_at = now + self.window;
        }
        *count += 1;
        *count >= self.max_failures
    }

    pub async fn is_blocked(&self, ip: &str) -> bool {
        let mut guard = self.inner.lock().await;
        if let Some((count, reset_at)) = guard.get(ip) {
            if Instant::now() >= *reset_at {
                guard.remove(ip);
                return false;
            }
            return *count >= self.max_failures;
        }
        false
    }

    fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
    pub sessions: SessionRepository,
    pub users: UserRepository,
    pub trusted_proxy_count: usize,
    pub auth_failure_limiter: Option<Arc<AuthFailureLimiter>>,
}

fn unauthorized(message: &str) -> Response {
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

async fn reject(auth_state: &AuthState, client_ip: &str, message: &str) -> Response {
    if let Some(ref limiter) = auth_state.auth_failure_limiter {
        if limiter.record_failure(client_ip).await {
            tracing::warn!(client_ip = %client_ip, "Too many failed authentication attempts");
            return HttpAppError(AppError::RateLimited {
                retry_after_secs: limiter.retry_after_secs(),
            })
            .into_response();
        }
    }
    tracing::debug!(client_ip = %client_ip, reason = message, "Authentication failed");
    unauthorized(message)
}

/// Requires `Authorization: Bearer <jwt>` whose session is still active and
/// whose user is neither deleted nor banned. Inserts [`AuthUser`] and
/// [`ClientIp`] into the request extensions.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_ip = client_ip_of(&request, auth_state.trusted_proxy_count);

    if let Some(ref limiter) = auth_state.auth_failure_limiter {
        if limiter.is_blocked(&client_ip).await {
            return HttpAppError(AppError::RateLimited {
                retry_after_secs: limiter.retry_after_secs(),
            })
            .into_response();
        }
    }

    let token = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        None => return reject(&auth_state, &client_ip, "Missing authorization header").await,
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => {
                return reject(
                    &auth_state,
                    &client_ip,
                    "Invalid authorization header format",
                )
                .await
            }
        },
    };

    let claims = match verify_token(&auth_state.jwt_secret, &token) {
        Ok(claims) => claims,
        Err(_) => return reject(&auth_state, &client_ip, "Invalid or expired token").await,
    };

    match auth_state.sessions.is_valid(claims.sid, claims.sub).await {
        Ok(true) => {}
        Ok(false) => {
            return reject(&auth_state, &client_ip, "Session expired or revoked").await;
        }
        Err(e) => return HttpAppError(e).into_response(),
    }

    // The stored role wins over the token's: artist create/delete changes it mid-session.
    let role = match auth_state.users.find_by_id(claims.sub).await {
        Ok(Some(user)) => user.role,
        Ok(None) => return reject(&auth_state, &client_ip, "User not found").await,
        Err(e) => return HttpAppError(e).into_response(),
    };

    let auth_user = AuthUser {
        user_id: claims.sub,
        role,
        session_id: claims.sid,
    };

    request.extensions_mut().insert(ClientIp(client_ip));
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_blocks_after_max_failures() {
        let limiter = AuthFailureLimiter::new(3, 900);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.record_failure("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.1").await);
        assert!(limiter.record_failure("10.0.0.1").await);
        assert!(limiter.is_blocked("10.0.0.1").await);
        assert!(!limiter.is_blocked("10.0.0.2").await);
    }
}
