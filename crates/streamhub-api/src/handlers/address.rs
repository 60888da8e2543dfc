use crate::auth::models::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use streamhub_core::models::{CreateAddressRequest, UpdateAddressRequest};
use streamhub_core::AppError;
use uuid::Uuid;

fn address_not_found() -> AppError {
    AppError::NotFound("Address not found".to_string())
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id))]
pub async fn add_address(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateAddressRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let address = state.db.addresses.create(auth_user.user_id, request).await?;
    Ok(ApiResponse::created("Address added", address))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn list_addresses(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let addresses = state.db.addresses.list(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Addresses fetched", addresses))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, address_id = %id))]
pub async fn get_address(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let address = state
        .db
        .addresses
        .find(id, auth_user.user_id)
        .await?
        .ok_or_else(address_not_found)?;
    Ok(ApiResponse::ok("Address fetched", address))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, address_id = %id))]
pub async fn update_address(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateAddressRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let address = state
        .db
        .addresses
        .update(id, auth_user.user_id, request)
        .await?
        .ok_or_else(address_not_found)?;
    Ok(ApiResponse::ok("Address updated", address))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, address_id = %id))]
pub async fn delete_address(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state.db.addresses.delete(id, auth_user.user_id).await? {
        return Err(address_not_found().into());
    }
    Ok(ApiResponse::message("Address deleted"))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn get_default_address(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let address = state
        .db
        .addresses
        .find_default(auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No default address set".to_string()))?;
    Ok(ApiResponse::ok("Default address fetched", address))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, address_id = %id))]
pub async fn set_default_address(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let address = state
        .db
        .addresses
        .set_default(id, auth_user.user_id)
        .await?
        .ok_or_else(address_not_found)?;
    Ok(ApiResponse::ok("Default address updated", address))
}
