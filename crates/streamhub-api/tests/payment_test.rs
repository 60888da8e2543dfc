//! Payment integration tests: intents, the signed webhook, subscriptions and refunds.
//!
//! Run with: `cargo test -p streamhub-api --test payment_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use axum::body::Bytes;
use helpers::auth::{register_admin, register_test_user, TestUser};
use helpers::fixtures::insert_plan;
use helpers::{api_path, setup_test_app, TestApp, TEST_WEBHOOK_SECRET};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use streamhub_services::payment::webhook::sign_payload;
use uuid::Uuid;

fn event(event_type: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": { "object": object }
    }))
    .unwrap()
}

async fn deliver(app: &TestApp, payload: &[u8], secret: &str) -> axum_test::TestResponse {
    let signature = sign_payload(payload, secret, chrono::Utc::now().timestamp()).unwrap();
    app.client()
        .post(&api_path("/payment/webhook"))
        .add_header("stripe-signature", signature)
        .add_header("Content-Type", "application/json")
        .bytes(Bytes::copy_from_slice(payload))
        .await
}

/// Places an order for one 20.00 product and returns its id.
async fn place_order(app: &TestApp, buyer: &TestUser) -> String {
    let admin = register_admin(app).await;
    let product: Value = app
        .client()
        .post(&api_path("/store/create-product"))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "name": "Vinyl", "price": 20.0, "stock": 4 }))
        .await
        .json();
    app.client()
        .post(&api_path("/store/add-to-cart"))
        .add_header("Authorization", buyer.bearer())
        .json(&json!({ "product_id": product["data"]["id"], "quantity": 1 }))
        .await;
    let order: Value = app
        .client()
        .post(&api_path("/store/checkout"))
        .add_header("Authorization", buyer.bearer())
        .await
        .json();
    order["data"]["id"].as_str().unwrap().to_string()
}

async fn pay_for_order(app: &TestApp, buyer: &TestUser, order_id: &str) -> Value {
    let response = app
        .client()
        .post(&api_path("/payment/merchandise"))
        .add_header("Authorization", buyer.bearer())
        .json(&json!({ "order_id": order_id }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    body["data"].clone()
}

async fn order_status(app: &TestApp, order_id: &str) -> String {
    sqlx::query_scalar("SELECT status::text FROM orders WHERE id = $1::uuid")
        .bind(order_id)
        .fetch_one(app.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_merchandise_intent_is_recorded_pending() {
    let app = setup_test_app().await;
    let buyer = register_test_user(&app, None).await;
    let order_id = place_order(&app, &buyer).await;

    let intent = pay_for_order(&app, &buyer, &order_id).await;
    assert!(intent["client_secret"].as_str().is_some());
    assert_eq!(app.gateway.last_intent().unwrap().amount, 2000);

    let response = app
        .client()
        .get(&api_path(&format!(
            "/payment/transaction/{}",
            intent["payment_id"].as_str().unwrap()
        )))
        .add_header("Authorization", buyer.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["payment_type"], "merchandise");
}

#[tokio::test]
async fn test_paying_someone_elses_order_is_not_found() {
    let app = setup_test_app().await;
    let buyer = register_test_user(&app, None).await;
    let other = register_test_user(&app, None).await;
    let order_id = place_order(&app, &buyer).await;

    let response = app
        .client()
        .post(&api_path("/payment/merchandise"))
        .add_header("Authorization", other.bearer())
        .json(&json!({ "order_id": order_id }))
        .await;

    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["message"], "Order does not belong to user.");
}

#[tokio::test]
async fn test_webhook_success_is_idempotent() {
    let app = setup_test_app().await;
    let buyer = register_test_user(&app, None).await;
    let order_id = place_order(&app, &buyer).await;
    pay_for_order(&app, &buyer, &order_id).await;
    let intent_id = app.gateway.last_intent().unwrap().id;

    let payload = event("payment_intent.succeeded", json!({ "id": intent_id }));
    let response = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["data"]["received"], true);
    assert_eq!(order_status(&app, &order_id).await, "completed");

    // A redelivery is acknowledged and changes nothing.
    let response = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(order_status(&app, &order_id).await, "completed");

    // A late failure for an already settled payment is ignored too.
    let failed = event("payment_intent.payment_failed", json!({ "id": intent_id }));
    let response = deliver(&app, &failed, TEST_WEBHOOK_SECRET).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(order_status(&app, &order_id).await, "completed");
}

#[tokio::test]
async fn test_failed_payment_cancels_order_and_restocks() {
    let app = setup_test_app().await;
    let buyer = register_test_user(&app, None).await;
    let order_id = place_order(&app, &buyer).await;
    pay_for_order(&app, &buyer, &order_id).await;
    let intent_id = app.gateway.last_intent().unwrap().id;

    let payload = event("payment_intent.payment_failed", json!({ "id": intent_id }));
    let response = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;
    assert_eq!(response.status_code(), 200);

    assert_eq!(order_status(&app, &order_id).await, "cancelled");
    let stock: i32 = sqlx::query_scalar("SELECT stock FROM products WHERE name = 'Vinyl'")
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(stock, 4);
}

#[tokio::test]
async fn test_webhook_with_bad_signature_is_rejected() {
    let app = setup_test_app().await;
    let payload = event("payment_intent.succeeded", json!({ "id": "pi_forged" }));

    let response = deliver(&app, &payload, "whsec_someone_else").await;
    assert_eq!(response.status_code(), 400);

    let response = app
        .client()
        .post(&api_path("/payment/webhook"))
        .bytes(Bytes::copy_from_slice(&payload))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_unhandled_event_types_are_acknowledged() {
    let app = setup_test_app().await;
    let payload = event("customer.created", json!({ "id": "cus_1" }));

    let response = deliver(&app, &payload, TEST_WEBHOOK_SECRET).await;

    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_refund_requires_a_succeeded_payment_and_happens_once() {
    let app = setup_test_app().await;
    let buyer = register_test_user(&app, None).await;
    let order_id = place_order(&app, &buyer).await;
    let intent = pay_for_order(&app, &buyer, &order_id).await;
    let refund = api_path(&format!(
        "/payment/refund/{}",
        intent["payment_id"].as_str().unwrap()
    ));

    let response = app
        .client()
        .post(&refund)
        .add_header("Authorization", buyer.bearer())
        .await;
    assert_eq!(response.status_code(), 400);

    let intent_id = app.gateway.last_intent().unwrap().id;
    deliver(
        &app,
        &event("payment_intent.succeeded", json!({ "id": intent_id })),
        TEST_WEBHOOK_SECRET,
    )
    .await;

    let response = app
        .client()
        .post(&refund)
        .add_header("Authorization", buyer.bearer())
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    let body: Value = response.json();
    assert_eq!(body["data"]["refund_status"], "requested");

    let response = app
        .client()
        .post(&refund)
        .add_header("Authorization", buyer.bearer())
        .await;
    assert_eq!(response.status_code(), 409);
    assert_eq!(app.gateway.refunds(), 1);
}

#[tokio::test]
async fn test_paid_subscription_activates_on_webhook() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let plan_id = insert_plan(
        app.pool(),
        "Premium",
        2,
        Decimal::new(999, 2),
        Some("price_premium"),
    )
    .await;

    let response = app
        .client()
        .post(&api_path("/payment/subscription"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "plan_id": plan_id }))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());

    let body: Value = app
        .client()
        .get(&api_path("/subscription/me"))
        .add_header("Authorization", user.bearer())
        .await
        .json();
    assert_eq!(body["data"]["status"], "pending");

    let intent_id = app.gateway.last_intent().unwrap().id;
    let response = deliver(
        &app,
        &event("payment_intent.succeeded", json!({ "id": intent_id })),
        TEST_WEBHOOK_SECRET,
    )
    .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = app
        .client()
        .get(&api_path("/subscription/me"))
        .add_header("Authorization", user.bearer())
        .await
        .json();
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["plan_name"], "Premium");
    assert!(body["data"]["end_date"].as_str().is_some());
}

#[tokio::test]
async fn test_free_plan_activates_without_payment() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let plan_id = insert_plan(app.pool(), "Free", 0, Decimal::ZERO, None).await;

    let response = app
        .client()
        .post(&api_path("/payment/subscription"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "plan_id": plan_id }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "active");
    assert!(body["data"]["payment_id"].is_null());
    assert!(app.gateway.last_intent().is_none());

    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(payments, 0);
}

#[tokio::test]
async fn test_other_users_subscription_needs_admin() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;
    let other = register_test_user(&app, None).await;
    let plan_id = insert_plan(app.pool(), "Free", 0, Decimal::ZERO, None).await;
    app.client()
        .post(&api_path("/payment/subscription"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "plan_id": plan_id }))
        .await;
    let path = api_path(&format!("/subscription/user/{}", user.user_id));

    let response = app
        .client()
        .get(&path)
        .add_header("Authorization", other.bearer())
        .await;
    assert_eq!(response.status_code(), 403);

    let admin = register_admin(&app).await;
    let response = app
        .client()
        .get(&path)
        .add_header("Authorization", admin.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
}
