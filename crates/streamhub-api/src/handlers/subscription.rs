use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use streamhub_core::{AppError, Capability};
use uuid::Uuid;

#[tracing::instrument(skip(state, _auth_user))]
pub async fn list_plans(
    _auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let plans = state.db.subscriptions.list_active_plans().await?;
    Ok(ApiResponse::ok("Subscription plans fetched", plans))
}

#[tracing::instrument(skip(state, _auth_user), fields(plan_id = %id))]
pub async fn get_plan(
    _auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let plan = state
        .db
        .subscriptions
        .find_active_plan(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription plan not found".to_string()))?;
    Ok(ApiResponse::ok("Subscription plan fetched", plan))
}

async fn current_subscription(state: &AppState, user_id: Uuid) -> Result<impl IntoResponse, HttpAppError> {
    let details = state
        .db
        .subscriptions
        .current_details(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No subscription found".to_string()))?;
    Ok(ApiResponse::ok("Subscription fetched", details))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn my_subscription(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    current_subscription(&state, auth_user.user_id).await
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, target_user_id = %user_id))]
pub async fn user_subscription(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    if user_id != auth_user.user_id {
        auth_user.require(Capability::ViewAnySubscription)?;
    }
    current_subscription(&state, user_id).await
}
