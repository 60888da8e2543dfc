use crate::auth::models::AuthUser;
use crate::error::{AppJson, HttpAppError};
use crate::response::ApiResponse;
use crate::services::payment::PaymentService;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use streamhub_core::models::{MerchandisePaymentRequest, SubscriptionPaymentRequest};
use uuid::Uuid;

const SIGNATURE_HEADER: &str = "stripe-signature";

fn payments(state: &AppState) -> PaymentService {
    PaymentService::new(&state.commerce, &state.db)
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    received: bool,
    event_id: String,
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, plan_id = %request.plan_id))]
pub async fn subscription_payment(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<SubscriptionPaymentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let intent = payments(&state)
        .create_subscription_payment(auth_user.user_id, request.plan_id)
        .await?;
    Ok(ApiResponse::ok("Subscription payment created", intent))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, order_id = %request.order_id))]
pub async fn merchandise_payment(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<MerchandisePaymentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let intent = payments(&state)
        .create_merchandise_payment(auth_user.user_id, request.order_id)
        .await?;
    Ok(ApiResponse::ok("Payment intent created", intent))
}

/// Gateway callback. Unauthenticated; the signature header is the credential.
#[tracing::instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let event_id = payments(&state).handle_webhook(&body, signature).await?;
    Ok(ApiResponse::ok(
        "Webhook received",
        WebhookAck {
            received: true,
            event_id,
        },
    ))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, payment_id = %payment_id))]
pub async fn get_transaction(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let payment = payments(&state)
        .get_transaction(auth_user.user_id, payment_id)
        .await?;
    Ok(ApiResponse::ok("Transaction fetched", payment))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, payment_id = %payment_id))]
pub async fn refund(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let payment = payments(&state)
        .initiate_refund(auth_user.user_id, payment_id)
        .await?;
    Ok(ApiResponse::ok("Refund requested", payment))
}
