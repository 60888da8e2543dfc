use sqlx::{PgPool, Postgres, Transaction};
use streamhub_core::models::{
    SubscriptionDetails, SubscriptionPlan, SubscriptionStatus, UserSubscription,
};
use streamhub_core::AppError;
use uuid::Uuid;

use crate::db::transaction::with_transaction;

const PLAN_COLUMNS: &str = r#"
    id, name, description, plan_level, price, currency, duration_months, stripe_price_id, is_active
"#;

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, plan_id, status, payment_status, auto_renew, stripe_subscription_id,
    start_date, end_date, created_at, updated_at
"#;

const DETAILS_SELECT: &str = r#"
    SELECT us.id, us.plan_id, p.name AS plan_name, p.plan_level, us.status,
           us.payment_status, us.auto_renew, us.start_date, us.end_date
    FROM user_subscriptions us
    JOIN subscription_plans p ON p.id = us.plan_id
"#;

#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_active_plans(&self) -> Result<Vec<SubscriptionPlan>, AppError> {
        let rows = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {} FROM subscription_plans WHERE is_active ORDER BY plan_level, price",
            PLAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_active_plan(&self, id: Uuid) -> Result<Option<SubscriptionPlan>, AppError> {
        let row = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {} FROM subscription_plans WHERE id = $1 AND is_active",
            PLAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Plan lookup that also sees retired plans, for subscriptions still pointing at them.
    pub async fn find_plan(&self, id: Uuid) -> Result<Option<SubscriptionPlan>, AppError> {
        let row = sqlx::query_as::<_, SubscriptionPlan>(&format!(
            "SELECT {} FROM subscription_plans WHERE id = $1",
            PLAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// The newest subscription of the user in the given status.
    pub async fn latest_with_status(
        &self,
        user_id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<Option<UserSubscription>, AppError> {
        let row = sqlx::query_as::<_, UserSubscription>(&format!(
            r#"
            SELECT {} FROM user_subscriptions
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// The active subscription if there is one, else the newest pending attempt.
    pub async fn current_details(
        &self,
        user_id: Uuid,
    ) -> Result<Option<SubscriptionDetails>, AppError> {
        let row = sqlx::query_as::<_, SubscriptionDetails>(&format!(
            r#"
            {}
            WHERE us.user_id = $1 AND us.status IN ('active', 'pending')
            ORDER BY (us.status = 'active') DESC, us.created_at DESC
            LIMIT 1
            "#,
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserSubscription>, AppError> {
        let row = sqlx::query_as::<_, UserSubscription>(&format!(
            "SELECT {} FROM user_subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Cancels every open subscription of the user and starts the free plan.
    pub async fn activate_free(
        &self,
        user_id: Uuid,
        plan: &SubscriptionPlan,
    ) -> Result<UserSubscription, AppError> {
        let plan_id = plan.id;
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                sqlx::query(
                    r#"
                    UPDATE user_subscriptions
                    SET status = 'cancelled',
                        payment_status = CASE WHEN status = 'pending' THEN 'failed' ELSE 'none' END,
                        updated_at = NOW()
                    WHERE user_id = $1 AND status IN ('active', 'pending')
                    "#,
                )
                .bind(user_id)
                .execute(&mut **tx)
                .await?;

                let id = Uuid::new_v4();
                let row = sqlx::query_as::<_, UserSubscription>(&format!(
                    r#"
                    INSERT INTO user_subscriptions
                        (id, user_id, plan_id, status, payment_status, auto_renew,
                         stripe_subscription_id, start_date, end_date)
                    VALUES ($1, $2, $3, 'active', 'none', FALSE, $4, NOW(), NULL)
                    RETURNING {}
                    "#,
                    SUBSCRIPTION_COLUMNS
                ))
                .bind(id)
                .bind(user_id)
                .bind(plan_id)
                .bind(format!("free_plan_{}", id))
                .fetch_one(&mut **tx)
                .await?;

                Ok(row)
            })
        })
        .await
    }

    pub async fn insert_pending_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        plan: &SubscriptionPlan,
        stripe_subscription_id: &str,
    ) -> Result<UserSubscription, AppError> {
        let row = sqlx::query_as::<_, UserSubscription>(&format!(
            r#"
            INSERT INTO user_subscriptions
                (id, user_id, plan_id, status, payment_status, auto_renew,
                 stripe_subscription_id, start_date, end_date)
            VALUES ($1, $2, $3, 'pending', 'pending', TRUE, $4, NOW(),
                    NOW() + make_interval(months => $5))
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(plan.id)
        .bind(stripe_subscription_id)
        .bind(plan.duration_months)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Abandons a pending attempt. Returns false if it was no longer pending.
    pub async fn cancel_pending_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = 'cancelled', payment_status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Moves an active paid subscription onto a higher plan. The row waits in
    /// `pending` until the prorated invoice is paid.
    pub async fn switch_plan_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        plan: &SubscriptionPlan,
    ) -> Result<Option<UserSubscription>, AppError> {
        let row = sqlx::query_as::<_, UserSubscription>(&format!(
            r#"
            UPDATE user_subscriptions
            SET plan_id = $2, status = 'pending', payment_status = 'pending',
                start_date = NOW(), end_date = NOW() + make_interval(months => $3),
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id)
        .bind(plan.id)
        .bind(plan.duration_months)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Pending to active. With `extend` the paid period restarts now. Any
    /// other active subscription of the same user is cancelled so a user
    /// holds at most one.
    pub async fn activate_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        extend: bool,
    ) -> Result<bool, AppError> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE user_subscriptions us
            SET status = 'active',
                payment_status = 'paid',
                end_date = CASE WHEN $2
                    THEN NOW() + make_interval(months => p.duration_months)
                    ELSE us.end_date END,
                updated_at = NOW()
            FROM subscription_plans p
            WHERE us.id = $1 AND p.id = us.plan_id AND us.status = 'pending'
            RETURNING us.user_id
            "#,
        )
        .bind(id)
        .bind(extend)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(user_id) = user_id else {
            return Ok(false);
        };

        sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = 'cancelled', payment_status = 'none', updated_at = NOW()
            WHERE user_id = $1 AND status = 'active' AND id <> $2
            "#,
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut **tx)
        .await?;

        Ok(true)
    }

    /// Ends a subscription after a failed or refunded payment.
    pub async fn cancel_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        payment_status: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = 'cancelled', payment_status = $2, auto_renew = FALSE, updated_at = NOW()
            WHERE id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(id)
        .bind(payment_status)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
