//! Application setup and initialization
//!
//! Everything `main` needs before it can serve: configuration checks,
//! tracing, the database pool, external clients and the router.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod telemetry;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use streamhub_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    telemetry::init_telemetry();

    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(environment = %config.environment(), "Configuration loaded and validated");

    let pool = database::setup_database(&config).await?;
    let state = services::initialize_services(&config, pool).await?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
