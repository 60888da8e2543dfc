//! Payment gateway
//!
//! The gateway owns card handling; the API only creates intents, subscriptions
//! and refunds, and learns about outcomes through signed webhook events.

#[cfg(feature = "stripe")]
pub mod stripe;
#[cfg(feature = "stripe")]
pub mod webhook;

use async_trait::async_trait;
use streamhub_core::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),

    #[error("Gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected gateway response: {0}")]
    Decode(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Malformed webhook payload: {0}")]
    InvalidPayload(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSignature(msg) => {
                AppError::BadRequest(format!("Webhook signature verification failed: {}", msg))
            }
            GatewayError::InvalidPayload(msg) => {
                AppError::BadRequest(format!("Invalid webhook payload: {}", msg))
            }
            other => AppError::PaymentGateway(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: String,
    /// Minor units (cents).
    pub amount: i64,
    pub currency: String,
    pub payment_method_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentIntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub customer_id: String,
    pub description: String,
    pub metadata: Vec<(String, String)>,
}

/// A recurring subscription at the gateway together with the intent paying
/// its latest invoice, if one is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: String,
    pub latest_payment: Option<PaymentIntent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn find_customer_by_email(&self, email: &str) -> GatewayResult<Option<String>>;

    async fn create_customer(&self, email: &str, name: &str) -> GatewayResult<String>;

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> GatewayResult<PaymentIntent>;

    /// Starts an incomplete subscription whose first invoice is paid client side.
    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> GatewayResult<GatewaySubscription>;

    /// Moves the subscription's single item onto a new price with proration.
    async fn change_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
    ) -> GatewayResult<GatewaySubscription>;

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<()>;

    async fn create_refund(&self, payment_intent_id: &str) -> GatewayResult<Refund>;
}
