//! Payment orchestration: intents, subscription changes, refunds and the
//! gateway webhook.
//!
//! Outcomes only ever arrive through the webhook. Every webhook transition is
//! a guarded update that returns the row it changed, so a redelivered event
//! changes nothing and cascades nothing.

use crate::state::{CommerceState, DbState};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;
use streamhub_core::models::{
    to_minor_units, ActivePlan, OrderStatus, Payment, PaymentIntentResponse, PaymentType,
    SubscriptionChange, SubscriptionPlan, SubscriptionSnapshot, SubscriptionStatus, User,
    UserSubscription,
};
use streamhub_core::AppError;
use streamhub_db::{
    with_transaction, NewPayment, PaymentRepository, StoreRepository, SubscriptionRepository,
    UserRepository,
};
use streamhub_services::{
    verify_signature, GatewaySubscription, PaymentGateway, PaymentIntentRequest, WebhookEvent,
};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    webhook_secret: String,
    currency: String,
    pool: PgPool,
    users: UserRepository,
    payments: PaymentRepository,
    subscriptions: SubscriptionRepository,
    store: StoreRepository,
}

impl PaymentService {
    pub fn new(commerce: &CommerceState, db: &DbState) -> Self {
        Self {
            gateway: commerce.gateway.clone(),
            webhook_secret: commerce.webhook_secret.clone(),
            currency: commerce.currency.clone(),
            pool: db.pool.clone(),
            users: db.users.clone(),
            payments: db.payments.clone(),
            subscriptions: db.subscriptions.clone(),
            store: db.store.clone(),
        }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Local record first, then the gateway's customers by email, then a new
    /// customer. Whatever is found is remembered locally.
    pub async fn get_or_create_customer(&self, user: &User) -> Result<String, AppError> {
        if let Some(customer_id) = self.payments.stripe_customer(user.id).await? {
            return Ok(customer_id);
        }

        let customer_id = match self.gateway.find_customer_by_email(&user.email).await? {
            Some(existing) => existing,
            None => {
                let created = self
                    .gateway
                    .create_customer(&user.email, &user.username)
                    .await?;
                tracing::info!(user_id = %user.id, "Gateway customer created");
                created
            }
        };

        self.payments
            .save_stripe_customer(user.id, &customer_id)
            .await
    }

    pub async fn create_merchandise_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<PaymentIntentResponse, AppError> {
        let order = self
            .store
            .find_order(order_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order does not belong to user.".to_string()))?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::BadRequest(
                "Order is not awaiting payment.".to_string(),
            ));
        }
        if order.total_amount <= rust_decimal::Decimal::ZERO {
            return Err(AppError::BadRequest(
                "Order total amount must be greater than 0.".to_string(),
            ));
        }
        let amount_minor = to_minor_units(order.total_amount)
            .ok_or_else(|| AppError::InvalidInput("Order total is out of range".to_string()))?;

        let user = self.load_user(user_id).await?;
        let customer_id = self.get_or_create_customer(&user).await?;

        let started = Instant::now();
        let intent = self
            .gateway
            .create_payment_intent(&PaymentIntentRequest {
                amount_minor,
                currency: self.currency.clone(),
                customer_id: customer_id.clone(),
                description: format!("Order {}", order.id),
                metadata: vec![
                    ("order_id".to_string(), order.id.to_string()),
                    ("user_id".to_string(), user_id.to_string()),
                ],
            })
            .await?;
        tracing::info!(
            order_id = %order.id,
            payment_intent_id = %intent.id,
            duration_ms = started.elapsed().as_millis() as u64,
            "Payment intent created"
        );

        let payment = self
            .payments
            .create(NewPayment {
                user_id,
                payment_type: PaymentType::Merchandise,
                stripe_payment_intent_id: Some(intent.id.clone()),
                stripe_subscription_id: None,
                stripe_customer_id: Some(customer_id),
                user_subscription_id: None,
                order_id: Some(order.id),
                amount: order.total_amount,
                currency: self.currency.clone(),
                payment_method: intent.payment_method_type.clone(),
            })
            .await?;

        Ok(PaymentIntentResponse {
            payment_id: Some(payment.id),
            client_secret: intent.client_secret,
            status: intent.status,
        })
    }

    async fn snapshot(
        &self,
        user_id: Uuid,
    ) -> Result<(SubscriptionSnapshot, Option<UserSubscription>, Option<UserSubscription>), AppError>
    {
        let active = self
            .subscriptions
            .latest_with_status(user_id, SubscriptionStatus::Active)
            .await?;
        let pending = self
            .subscriptions
            .latest_with_status(user_id, SubscriptionStatus::Pending)
            .await?;

        let active_plan = match &active {
            Some(sub) => self
                .subscriptions
                .find_plan(sub.plan_id)
                .await?
                .map(|plan| ActivePlan {
                    level: plan.plan_level,
                    is_paid: !plan.is_free(),
                }),
            None => None,
        };

        Ok((
            SubscriptionSnapshot {
                active: active_plan,
                has_pending: pending.is_some(),
            },
            active,
            pending,
        ))
    }

    /// Applies the plan-change table for `plan_id`.
    pub async fn create_subscription_payment(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<PaymentIntentResponse, AppError> {
        let plan = self
            .subscriptions
            .find_active_plan(plan_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest("Invalid or inactive subscription plan.".to_string())
            })?;

        let (snapshot, active, pending) = self.snapshot(user_id).await?;
        let decision = SubscriptionChange::decide(snapshot, &plan);
        tracing::debug!(user_id = %user_id, plan_id = %plan.id, decision = ?decision, "Subscription change decided");

        match decision {
            SubscriptionChange::Reject(reason) => Err(AppError::BadRequest(reason.to_string())),
            SubscriptionChange::ActivateFree => {
                if let Some(gateway_id) = pending.as_ref().and_then(|p| p.stripe_subscription_id.as_deref()) {
                    self.cancel_gateway_subscription(gateway_id).await;
                }
                let subscription = self.subscriptions.activate_free(user_id, &plan).await?;
                tracing::info!(user_id = %user_id, subscription_id = %subscription.id, "Free plan activated");
                Ok(PaymentIntentResponse {
                    payment_id: None,
                    client_secret: None,
                    status: "active".to_string(),
                })
            }
            SubscriptionChange::CreatePending => {
                let price_id = price_id_of(&plan)?;
                let user = self.load_user(user_id).await?;
                let customer_id = self.get_or_create_customer(&user).await?;
                let gateway_sub = self.gateway.create_subscription(&customer_id, &price_id).await?;
                self.record_pending(user_id, plan, customer_id, gateway_sub, None)
                    .await
            }
            SubscriptionChange::ReplacePending => {
                let price_id = price_id_of(&plan)?;
                let previous = pending.ok_or_else(|| {
                    AppError::Internal("Pending subscription disappeared".to_string())
                })?;
                if let Some(gateway_id) = previous.stripe_subscription_id.as_deref() {
                    self.cancel_gateway_subscription(gateway_id).await;
                }
                let user = self.load_user(user_id).await?;
                let customer_id = self.get_or_create_customer(&user).await?;
                let gateway_sub = self.gateway.create_subscription(&customer_id, &price_id).await?;
                self.record_pending(user_id, plan, customer_id, gateway_sub, Some(previous.id))
                    .await
            }
            SubscriptionChange::UpgradeInPlace => {
                let price_id = price_id_of(&plan)?;
                let current = active.ok_or_else(|| {
                    AppError::Internal("Active subscription disappeared".to_string())
                })?;
                let gateway_id = current.stripe_subscription_id.clone().ok_or_else(|| {
                    AppError::Internal("Active paid subscription has no gateway id".to_string())
                })?;
                let user = self.load_user(user_id).await?;
                let customer_id = self.get_or_create_customer(&user).await?;
                let gateway_sub = self
                    .gateway
                    .change_subscription_price(&gateway_id, &price_id)
                    .await?;
                self.record_upgrade(user_id, plan, current.id, customer_id, gateway_sub)
                    .await
            }
        }
    }

    async fn cancel_gateway_subscription(&self, gateway_id: &str) {
        if gateway_id.starts_with("free_plan_") {
            return;
        }
        if let Err(e) = self.gateway.cancel_subscription(gateway_id).await {
            tracing::warn!(stripe_subscription_id = %gateway_id, error = %e, "Failed to cancel gateway subscription");
        }
    }

    async fn record_pending(
        &self,
        user_id: Uuid,
        plan: SubscriptionPlan,
        customer_id: String,
        gateway_sub: GatewaySubscription,
        replaces: Option<Uuid>,
    ) -> Result<PaymentIntentResponse, AppError> {
        let subscriptions = self.subscriptions.clone();
        let payments = self.payments.clone();
        let intent = gateway_sub.latest_payment.clone();
        let intent_id = intent.as_ref().map(|i| i.id.clone());
        let payment_method = intent.as_ref().and_then(|i| i.payment_method_type.clone());
        let gateway_id = gateway_sub.id.clone();

        let payment = with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                if let Some(old) = replaces {
                    subscriptions.cancel_pending_tx(tx, old).await?;
                    payments.cancel_pending_for_subscription_tx(tx, old).await?;
                }
                let subscription = subscriptions
                    .insert_pending_tx(tx, user_id, &plan, &gateway_id)
                    .await?;
                payments
                    .create_tx(
                        tx,
                        NewPayment {
                            user_id,
                            payment_type: PaymentType::Subscription,
                            stripe_payment_intent_id: intent_id,
                            stripe_subscription_id: Some(gateway_id),
                            stripe_customer_id: Some(customer_id),
                            user_subscription_id: Some(subscription.id),
                            order_id: None,
                            amount: plan.price,
                            currency: plan.currency.clone(),
                            payment_method,
                        },
                    )
                    .await
            })
        })
        .await?;

        tracing::info!(
            user_id = %user_id,
            payment_id = %payment.id,
            stripe_subscription_id = %gateway_sub.id,
            "Pending subscription recorded"
        );
        Ok(intent_response(payment, gateway_sub))
    }

    async fn record_upgrade(
        &self,
        user_id: Uuid,
        plan: SubscriptionPlan,
        subscription_id: Uuid,
        customer_id: String,
        gateway_sub: GatewaySubscription,
    ) -> Result<PaymentIntentResponse, AppError> {
        let subscriptions = self.subscriptions.clone();
        let payments = self.payments.clone();
        let intent = gateway_sub.latest_payment.clone();
        let intent_id = intent.as_ref().map(|i| i.id.clone());
        let payment_method = intent.as_ref().and_then(|i| i.payment_method_type.clone());
        let gateway_id = gateway_sub.id.clone();

        let payment = with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                subscriptions
                    .switch_plan_tx(tx, subscription_id, &plan)
                    .await?
                    .ok_or_else(|| {
                        AppError::Conflict("Subscription is no longer active".to_string())
                    })?;
                payments
                    .create_tx(
                        tx,
                        NewPayment {
                            user_id,
                            payment_type: PaymentType::Subscription,
                            stripe_payment_intent_id: intent_id,
                            stripe_subscription_id: Some(gateway_id),
                            stripe_customer_id: Some(customer_id),
                            user_subscription_id: Some(subscription_id),
                            order_id: None,
                            amount: plan.price,
                            currency: plan.currency.clone(),
                            payment_method,
                        },
                    )
                    .await
            })
        })
        .await?;

        tracing::info!(user_id = %user_id, payment_id = %payment.id, "Subscription upgrade pending payment");
        Ok(intent_response(payment, gateway_sub))
    }

    /// Verifies and applies one gateway event. Returns the event id.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<String, AppError> {
        let signature = signature.ok_or_else(|| {
            AppError::BadRequest("Missing Stripe-Signature header".to_string())
        })?;
        verify_signature(
            payload,
            signature,
            &self.webhook_secret,
            chrono::Utc::now().timestamp(),
        )?;
        let (event_id, event) = WebhookEvent::parse(payload)?;

        let payments = self.payments.clone();
        let subscriptions = self.subscriptions.clone();
        let store = self.store.clone();
        let applied = event.clone();

        let changed = with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                match applied {
                    WebhookEvent::PaymentSucceeded { payment_intent_id } => {
                        let Some(payment) = payments.succeed_by_intent_tx(tx, &payment_intent_id).await? else {
                            return Ok(false);
                        };
                        match (payment.payment_type, payment.order_id, payment.user_subscription_id) {
                            (PaymentType::Merchandise, Some(order_id), _) => {
                                store.settle_order_tx(tx, order_id, OrderStatus::Completed).await?;
                            }
                            (PaymentType::Subscription, _, Some(subscription_id)) => {
                                subscriptions.activate_tx(tx, subscription_id, false).await?;
                            }
                            _ => {}
                        }
                        Ok(true)
                    }
                    WebhookEvent::PaymentFailed { payment_intent_id } => {
                        let Some(payment) = payments.fail_by_intent_tx(tx, &payment_intent_id).await? else {
                            return Ok(false);
                        };
                        match (payment.payment_type, payment.order_id, payment.user_subscription_id) {
                            (PaymentType::Merchandise, Some(order_id), _) => {
                                store.cancel_and_restock_tx(tx, order_id).await?;
                            }
                            (PaymentType::Subscription, _, Some(subscription_id)) => {
                                subscriptions.cancel_tx(tx, subscription_id, "failed").await?;
                            }
                            _ => {}
                        }
                        Ok(true)
                    }
                    WebhookEvent::InvoicePaid { subscription_id } => {
                        let Some(payment) = payments
                            .succeed_for_gateway_subscription_tx(tx, &subscription_id)
                            .await?
                        else {
                            return Ok(false);
                        };
                        if let Some(local_id) = payment.user_subscription_id {
                            subscriptions.activate_tx(tx, local_id, true).await?;
                        }
                        Ok(true)
                    }
                    WebhookEvent::ChargeRefunded {
                        payment_intent_id,
                        charge_id,
                    } => {
                        let Some(payment) = payments
                            .refund_succeeded_tx(tx, &payment_intent_id, &charge_id)
                            .await?
                        else {
                            return Ok(false);
                        };
                        match (payment.payment_type, payment.order_id, payment.user_subscription_id) {
                            (PaymentType::Merchandise, Some(order_id), _) => {
                                store.cancel_and_restock_tx(tx, order_id).await?;
                            }
                            (PaymentType::Subscription, _, Some(subscription_id)) => {
                                subscriptions.cancel_tx(tx, subscription_id, "refunded").await?;
                            }
                            _ => {}
                        }
                        Ok(true)
                    }
                    WebhookEvent::Ignored { .. } => Ok(false),
                }
            })
        })
        .await?;

        match (&event, changed) {
            (WebhookEvent::Ignored { event_type }, _) => {
                tracing::debug!(event_id = %event_id, event_type = %event_type, "Webhook event ignored");
            }
            (_, true) => tracing::info!(event_id = %event_id, event = ?event, "Webhook event applied"),
            (_, false) => {
                tracing::info!(event_id = %event_id, event = ?event, "Webhook event already applied or unknown payment")
            }
        }
        Ok(event_id)
    }

    pub async fn get_transaction(&self, user_id: Uuid, payment_id: Uuid) -> Result<Payment, AppError> {
        self.payments
            .find_for_user(payment_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found.".to_string()))
    }

    pub async fn initiate_refund(&self, user_id: Uuid, payment_id: Uuid) -> Result<Payment, AppError> {
        let payment = self.get_transaction(user_id, payment_id).await?;

        if payment.refund_status != streamhub_core::models::RefundStatus::None {
            return Err(AppError::Conflict(
                "Refund already processed or requested.".to_string(),
            ));
        }
        if !payment.is_refundable() || payment.amount.is_zero() {
            return Err(AppError::BadRequest(
                "Payment is not eligible for refund.".to_string(),
            ));
        }
        let intent_id = payment.stripe_payment_intent_id.as_deref().ok_or_else(|| {
            AppError::BadRequest("Payment is not eligible for refund.".to_string())
        })?;

        let refund = self.gateway.create_refund(intent_id).await?;
        tracing::info!(payment_id = %payment.id, refund_id = %refund.id, "Refund requested");

        self.payments
            .mark_refund_requested(payment.id, &refund.id)
            .await?
            .ok_or_else(|| AppError::Conflict("Refund already processed or requested.".to_string()))
    }
}

fn price_id_of(plan: &SubscriptionPlan) -> Result<String, AppError> {
    plan.stripe_price_id
        .clone()
        .ok_or_else(|| AppError::BadRequest("Invalid or inactive subscription plan.".to_string()))
}

fn intent_response(payment: Payment, gateway_sub: GatewaySubscription) -> PaymentIntentResponse {
    match gateway_sub.latest_payment {
        Some(intent) => PaymentIntentResponse {
            payment_id: Some(payment.id),
            client_secret: intent.client_secret,
            status: intent.status,
        },
        None => PaymentIntentResponse {
            payment_id: Some(payment.id),
            client_secret: None,
            status: gateway_sub.status,
        },
    }
}
