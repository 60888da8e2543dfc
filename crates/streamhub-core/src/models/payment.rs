use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "payment_type", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Subscription,
    Merchandise,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "payment_status", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "refund_status", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    None,
    Requested,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub payment_type: PaymentType,
    pub user_subscription_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub refund_status: RefundStatus,
    pub stripe_refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_refundable(&self) -> bool {
        self.status == PaymentStatus::Succeeded && self.refund_status == RefundStatus::None
    }
}

/// Converts a decimal amount into the gateway's minor units (cents).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::from(100)).round().to_i64()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MerchandisePaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscriptionPaymentRequest {
    pub plan_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub payment_id: Option<Uuid>,
    pub client_secret: Option<String>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn minor_units_round_half_even() {
        assert_eq!(to_minor_units(Decimal::from_str("19.99").unwrap()), Some(1999));
        assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()), Some(0));
        assert_eq!(to_minor_units(Decimal::from(12)), Some(1200));
    }
}
