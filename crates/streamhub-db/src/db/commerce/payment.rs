use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use streamhub_core::models::{Payment, PaymentType};
use streamhub_core::AppError;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = r#"
    id, user_id, stripe_payment_intent_id, stripe_subscription_id, stripe_customer_id,
    payment_type, user_subscription_id, order_id, amount, currency, status,
    payment_method, refund_status, stripe_refund_id, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub payment_type: PaymentType,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub user_subscription_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
}

/// Local payment ledger. Webhook-driven transitions only touch rows still in the
/// expected prior state and hand back the row they changed, so a redelivered
/// event returns `None` and the caller cascades nothing.
#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payment: NewPayment) -> Result<Payment, AppError> {
        let mut conn = self.pool.acquire().await?;
        let row = insert(&mut *conn, payment).await?;
        Ok(row)
    }

    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        payment: NewPayment,
    ) -> Result<Payment, AppError> {
        insert(&mut **tx, payment).await
    }

    pub async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE id = $1 AND user_id = $2",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn succeed_by_intent_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        intent_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments SET status = 'succeeded', updated_at = NOW()
            WHERE stripe_payment_intent_id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(intent_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    pub async fn fail_by_intent_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        intent_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments SET status = 'failed', updated_at = NOW()
            WHERE stripe_payment_intent_id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(intent_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Settles the newest pending payment recorded against a gateway subscription.
    pub async fn succeed_for_gateway_subscription_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        stripe_subscription_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments SET status = 'succeeded', updated_at = NOW()
            WHERE id = (
                SELECT id FROM payments
                WHERE stripe_subscription_id = $1 AND status = 'pending'
                ORDER BY created_at DESC
                LIMIT 1
                FOR UPDATE
            ) AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(stripe_subscription_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Cancels the pending payments tied to an abandoned subscription attempt.
    pub async fn cancel_pending_for_subscription_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_subscription_id: Uuid,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'canceled', updated_at = NOW()
            WHERE user_subscription_id = $1 AND status = 'pending'
            "#,
        )
        .bind(user_subscription_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn refund_succeeded_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        intent_id: &str,
        refund_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET refund_status = 'succeeded',
                stripe_refund_id = COALESCE(stripe_refund_id, $2),
                updated_at = NOW()
            WHERE stripe_payment_intent_id = $1 AND refund_status <> 'succeeded'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(intent_id)
        .bind(refund_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row)
    }

    /// Records a gateway refund. Only a succeeded payment without a refund qualifies.
    pub async fn mark_refund_requested(
        &self,
        id: Uuid,
        refund_id: &str,
    ) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET refund_status = 'requested', stripe_refund_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'succeeded' AND refund_status = 'none'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(refund_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn stripe_customer(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT customer_id FROM stripe_customers WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    /// Keeps the first customer recorded for the user and returns it.
    pub async fn save_stripe_customer(
        &self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<String, AppError> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO stripe_customers (user_id, customer_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET customer_id = stripe_customers.customer_id
            RETURNING customer_id
            "#,
        )
        .bind(user_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

async fn insert(
    conn: &mut sqlx::PgConnection,
    payment: NewPayment,
) -> Result<Payment, AppError> {
    let row = sqlx::query_as::<_, Payment>(&format!(
        r#"
        INSERT INTO payments (
            id, user_id, stripe_payment_intent_id, stripe_subscription_id, stripe_customer_id,
            payment_type, user_subscription_id, order_id, amount, currency, payment_method
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(payment.user_id)
    .bind(payment.stripe_payment_intent_id)
    .bind(payment.stripe_subscription_id)
    .bind(payment.stripe_customer_id)
    .bind(payment.payment_type)
    .bind(payment.user_subscription_id)
    .bind(payment.order_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.payment_method)
    .fetch_one(conn)
    .await
    .map_err(|e| AppError::from(e).conflict_on_unique("Payment already recorded"))?;
    Ok(row)
}
