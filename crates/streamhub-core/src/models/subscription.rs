//! Subscription plans, user subscriptions and the plan-change policy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub plan_level: i32,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub currency: String,
    pub duration_months: i32,
    #[serde(skip_serializing)]
    pub stripe_price_id: Option<String>,
    pub is_active: bool,
}

impl SubscriptionPlan {
    pub fn is_free(&self) -> bool {
        self.price.is_zero() || self.stripe_price_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "subscription_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub payment_status: String,
    pub auto_renew: bool,
    pub stripe_subscription_id: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user subscription joined with the plan it points at.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SubscriptionDetails {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub plan_name: String,
    pub plan_level: i32,
    pub status: SubscriptionStatus,
    pub payment_status: String,
    pub auto_renew: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// What the caller currently holds, as far as the plan-change policy cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Level of the active subscription and whether it is billed through the gateway.
    pub active: Option<ActivePlan>,
    pub has_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePlan {
    pub level: i32,
    pub is_paid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// Activate the free plan immediately; any pending paid attempt is cancelled.
    ActivateFree,
    /// Create a gateway subscription and a pending local record.
    CreatePending,
    /// Cancel the pending gateway subscription, then create a new one.
    ReplacePending,
    /// Swap the price on the active gateway subscription.
    UpgradeInPlace,
    Reject(&'static str),
}

pub const DOWNGRADE_REJECTED: &str = "Cannot downgrade or select the same subscription plan.";

impl SubscriptionChange {
    /// The plan-change table. Rows are checked top to bottom.
    ///
    /// | active          | pending | target          | decision        |
    /// |-----------------|---------|-----------------|-----------------|
    /// | level >= target | any     | any             | Reject          |
    /// | any             | any     | free            | ActivateFree    |
    /// | any             | yes     | paid            | ReplacePending  |
    /// | paid            | no      | paid            | UpgradeInPlace  |
    /// | none or free    | no      | paid            | CreatePending   |
    pub fn decide(current: SubscriptionSnapshot, target: &SubscriptionPlan) -> Self {
        match (current.active, current.has_pending, target.is_free()) {
            (Some(active), _, _) if target.plan_level <= active.level => {
                SubscriptionChange::Reject(DOWNGRADE_REJECTED)
            }
            (_, _, true) => SubscriptionChange::ActivateFree,
            (_, true, false) => SubscriptionChange::ReplacePending,
            (Some(ActivePlan { is_paid: true, .. }), false, false) => {
                SubscriptionChange::UpgradeInPlace
            }
            (_, false, false) => SubscriptionChange::CreatePending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(level: i32, price: i64) -> SubscriptionPlan {
        SubscriptionPlan {
            id: Uuid::new_v4(),
            name: format!("level-{}", level),
            description: None,
            plan_level: level,
            price: Decimal::from(price),
            currency: "usd".to_string(),
            duration_months: 1,
            stripe_price_id: (price > 0).then(|| format!("price_{}", level)),
            is_active: true,
        }
    }

    fn active(level: i32, is_paid: bool) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            active: Some(ActivePlan { level, is_paid }),
            has_pending: false,
        }
    }

    #[test]
    fn no_subscription_free_target_activates_immediately() {
        let decision = SubscriptionChange::decide(SubscriptionSnapshot::default(), &plan(0, 0));
        assert_eq!(decision, SubscriptionChange::ActivateFree);
    }

    #[test]
    fn no_subscription_paid_target_creates_pending() {
        let decision = SubscriptionChange::decide(SubscriptionSnapshot::default(), &plan(1, 10));
        assert_eq!(decision, SubscriptionChange::CreatePending);
    }

    #[test]
    fn same_or_lower_level_is_rejected() {
        assert_eq!(
            SubscriptionChange::decide(active(2, true), &plan(2, 20)),
            SubscriptionChange::Reject(DOWNGRADE_REJECTED)
        );
        assert_eq!(
            SubscriptionChange::decide(active(2, true), &plan(1, 10)),
            SubscriptionChange::Reject(DOWNGRADE_REJECTED)
        );
        assert_eq!(
            SubscriptionChange::decide(active(1, true), &plan(0, 0)),
            SubscriptionChange::Reject(DOWNGRADE_REJECTED)
        );
    }

    #[test]
    fn paid_upgrade_updates_in_place() {
        assert_eq!(
            SubscriptionChange::decide(active(1, true), &plan(2, 20)),
            SubscriptionChange::UpgradeInPlace
        );
    }

    #[test]
    fn free_to_paid_creates_pending() {
        assert_eq!(
            SubscriptionChange::decide(active(0, false), &plan(1, 10)),
            SubscriptionChange::CreatePending
        );
    }

    #[test]
    fn pending_attempt_is_replaced() {
        let snapshot = SubscriptionSnapshot {
            active: None,
            has_pending: true,
        };
        assert_eq!(
            SubscriptionChange::decide(snapshot, &plan(3, 30)),
            SubscriptionChange::ReplacePending
        );
    }
}
