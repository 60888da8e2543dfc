//! Health check handler and response type.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
pub(super) struct HealthResponse {
    pub status: &'static str,
    pub server: &'static str,
    pub database: &'static str,
}

/// Pool state first, then a timed `SELECT 1`. A probe that times out while
/// the pool has no live connection is reported as still connecting.
async fn database_state(pool: &PgPool) -> &'static str {
    if pool.is_closed() {
        return if pool.size() > 0 {
            "disconnecting"
        } else {
            "disconnected"
        };
    }

    match tokio::time::timeout(PROBE_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => "connected",
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database health probe failed");
            "disconnected"
        }
        Err(_) if pool.size() == 0 => "connecting",
        Err(_) => {
            tracing::error!("Database health probe timed out");
            "disconnected"
        }
    }
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = database_state(&state.db.pool).await;
    let healthy = database == "connected";

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(HealthResponse {
            status: if healthy { "OK" } else { "ERROR" },
            server: "running",
            database,
        }),
    )
}
