//! Route configuration and setup.
//!
//! Resource route groups live in [domains](domains); the health check in [health](health).

mod domains;
mod health;

use crate::auth::middleware::{auth_middleware, AuthFailureLimiter, AuthState};
use crate::constants::{
    API_BASE, AUTH_FAILURE_LIMIT, AUTH_FAILURE_WINDOW_SECS, MAX_REQUEST_BODY_BYTES,
};
use crate::error::HttpAppError;
use crate::middleware::rate_limit::{rate_limit_middleware, HttpRateLimiter};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use streamhub_core::{AppError, Config};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const RATE_LIMITER_SHARDS: usize = 16;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let cors = setup_cors(config);
    let auth_state = setup_auth_state(&state);
    let rate_limiter = setup_rate_limiter(config);

    let protected_routes = protected_routes().route_layer(axum::middleware::from_fn_with_state(
        Arc::new(auth_state),
        auth_middleware,
    ));
    let app_state_routes = public_routes().merge(protected_routes);

    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);
    tracing::info!(http_concurrency_limit, "HTTP concurrency limit layer enabled");

    app_state_routes
        .route(
            &format!("{}/openapi.json", API_BASE),
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .merge(utoipa_rapidoc::RapiDoc::new(format!("{}/openapi.json", API_BASE)).path("/docs"))
        .fallback(route_not_found)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn route_not_found() -> HttpAppError {
    HttpAppError(AppError::NotFound("Route not found".to_string()))
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

fn setup_auth_state(state: &Arc<AppState>) -> AuthState {
    AuthState {
        jwt_secret: state.auth.jwt_secret.clone(),
        sessions: state.db.sessions.clone(),
        users: state.db.users.clone(),
        trusted_proxy_count: state.config.trusted_proxy_count(),
        auth_failure_limiter: Some(Arc::new(AuthFailureLimiter::new(
            AUTH_FAILURE_LIMIT,
            AUTH_FAILURE_WINDOW_SECS,
        ))),
    }
}

fn setup_rate_limiter(config: &Config) -> Arc<HttpRateLimiter> {
    tracing::info!(
        max_requests = config.rate_limit_max_requests(),
        window_secs = config.rate_limit_window_secs(),
        shard_count = RATE_LIMITER_SHARDS,
        "HTTP rate limiting enabled"
    );
    Arc::new(HttpRateLimiter::with_shards(
        config.rate_limit_max_requests(),
        config.rate_limit_window_secs(),
        RATE_LIMITER_SHARDS,
        config.trusted_proxy_count(),
    ))
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/health", API_BASE), get(health::health_check))
        .merge(domains::public_auth_routes())
        .merge(domains::webhook_routes())
}

fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(domains::session_routes())
        .merge(domains::media_routes())
        .merge(domains::library_routes())
        .merge(domains::artist_routes())
        .merge(domains::store_routes())
        .merge(domains::address_routes())
        .merge(domains::subscription_routes())
        .merge(domains::payment_routes())
}
