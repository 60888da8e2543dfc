use super::{
    GatewayError, GatewayResult, GatewaySubscription, PaymentGateway, PaymentIntent,
    PaymentIntentRequest, Refund,
};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};

const LATEST_INTENT: &str = "latest_invoice.payment_intent";

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
    client_secret: Option<String>,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    payment_method_types: Vec<String>,
}

impl From<IntentObject> for PaymentIntent {
    fn from(obj: IntentObject) -> Self {
        PaymentIntent {
            id: obj.id,
            client_secret: obj.client_secret,
            status: obj.status,
            amount: obj.amount,
            currency: obj.currency,
            payment_method_type: obj.payment_method_types.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    payment_intent: Option<IntentObject>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
    latest_invoice: Option<InvoiceObject>,
    items: Option<List<SubscriptionItem>>,
}

impl From<SubscriptionObject> for GatewaySubscription {
    fn from(obj: SubscriptionObject) -> Self {
        GatewaySubscription {
            id: obj.id,
            status: obj.status,
            latest_payment: obj
                .latest_invoice
                .and_then(|invoice| invoice.payment_intent)
                .map(PaymentIntent::from),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefundObject {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Stripe REST client. Requests are form encoded and authenticated with the
/// secret key; no Stripe SDK is involved.
#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_base: String, secret_key: String) -> GatewayResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/v1/{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> GatewayResult<T> {
        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                operation,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Stripe request failed"
            );
            GatewayError::RequestFailed(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|env| env.error.message)
                .unwrap_or_else(|| status.to_string());
            tracing::warn!(
                status = status.as_u16(),
                operation,
                message = %message,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Stripe rejected request"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(
            operation,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stripe request succeeded"
        );

        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn find_customer_by_email(&self, email: &str) -> GatewayResult<Option<String>> {
        let list: List<CustomerObject> = self
            .send(
                "customers.list",
                self.request(Method::GET, "customers")
                    .query(&[("email", email), ("limit", "1")]),
            )
            .await?;
        Ok(list.data.into_iter().next().map(|c| c.id))
    }

    async fn create_customer(&self, email: &str, name: &str) -> GatewayResult<String> {
        let customer: CustomerObject = self
            .send(
                "customers.create",
                self.request(Method::POST, "customers")
                    .form(&[("email", email), ("name", name)]),
            )
            .await?;
        Ok(customer.id)
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> GatewayResult<PaymentIntent> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), request.amount_minor.to_string()),
            ("currency".into(), request.currency.clone()),
            ("customer".into(), request.customer_id.clone()),
            ("description".into(), request.description.clone()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let intent: IntentObject = self
            .send(
                "payment_intents.create",
                self.request(Method::POST, "payment_intents").form(&form),
            )
            .await?;
        Ok(intent.into())
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> GatewayResult<GatewaySubscription> {
        let subscription: SubscriptionObject = self
            .send(
                "subscriptions.create",
                self.request(Method::POST, "subscriptions").form(&[
                    ("customer", customer_id),
                    ("items[0][price]", price_id),
                    ("payment_behavior", "default_incomplete"),
                    ("expand[]", LATEST_INTENT),
                ]),
            )
            .await?;
        Ok(subscription.into())
    }

    async fn change_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
    ) -> GatewayResult<GatewaySubscription> {
        let path = format!("subscriptions/{}", subscription_id);
        let current: SubscriptionObject = self
            .send("subscriptions.retrieve", self.request(Method::GET, &path))
            .await?;
        let item_id = current
            .items
            .and_then(|items| items.data.into_iter().next())
            .map(|item| item.id)
            .ok_or_else(|| GatewayError::Decode("subscription has no items".into()))?;

        let updated: SubscriptionObject = self
            .send(
                "subscriptions.update",
                self.request(Method::POST, &path).form(&[
                    ("items[0][id]", item_id.as_str()),
                    ("items[0][price]", price_id),
                    ("proration_behavior", "create_prorations"),
                    ("payment_behavior", "default_incomplete"),
                    ("expand[]", LATEST_INTENT),
                ]),
            )
            .await?;
        Ok(updated.into())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<()> {
        let _: SubscriptionObject = self
            .send(
                "subscriptions.cancel",
                self.request(Method::DELETE, &format!("subscriptions/{}", subscription_id)),
            )
            .await?;
        Ok(())
    }

    async fn create_refund(&self, payment_intent_id: &str) -> GatewayResult<Refund> {
        let refund: RefundObject = self
            .send(
                "refunds.create",
                self.request(Method::POST, "refunds")
                    .form(&[("payment_intent", payment_intent_id)]),
            )
            .await?;
        Ok(Refund {
            id: refund.id,
            status: refund.status,
        })
    }
}
