//! Merchandise store integration tests: products, cart, checkout and addresses.
//!
//! Run with: `cargo test -p streamhub-api --test store_test`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::auth::{register_admin, register_test_user, TestUser};
use helpers::{api_path, setup_test_app, TestApp};
use serde_json::{json, Value};

async fn create_product(app: &TestApp, admin: &TestUser, price: f64, stock: i32) -> String {
    let response = app
        .client()
        .post(&api_path("/store/create-product"))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "name": "Tour hoodie", "price": price, "stock": stock, "category": "apparel" }))
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: Value = response.json();
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn add_to_cart(app: &TestApp, user: &TestUser, product_id: &str, quantity: i32) -> u16 {
    app.client()
        .post(&api_path("/store/add-to-cart"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "product_id": product_id, "quantity": quantity }))
        .await
        .status_code()
        .as_u16()
}

#[tokio::test]
async fn test_only_admins_manage_products() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;

    let response = app
        .client()
        .post(&api_path("/store/create-product"))
        .add_header("Authorization", user.bearer())
        .json(&json!({ "name": "Poster", "price": 10.0, "stock": 5 }))
        .await;

    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_product_price_must_be_positive() {
    let app = setup_test_app().await;
    let admin = register_admin(&app).await;

    let response = app
        .client()
        .post(&api_path("/store/create-product"))
        .add_header("Authorization", admin.bearer())
        .json(&json!({ "name": "Free sticker", "price": 0.0, "stock": 5 }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_cart_respects_stock_including_cart_quantity() {
    let app = setup_test_app().await;
    let admin = register_admin(&app).await;
    let user = register_test_user(&app, None).await;
    let product_id = create_product(&app, &admin, 25.0, 3).await;

    assert_eq!(add_to_cart(&app, &user, &product_id, 2).await, 200);
    assert_eq!(add_to_cart(&app, &user, &product_id, 2).await, 400);
    assert_eq!(add_to_cart(&app, &user, &product_id, 1).await, 200);

    let body: Value = app
        .client()
        .get(&api_path("/store/cart"))
        .add_header("Authorization", user.bearer())
        .await
        .json();
    assert_eq!(body["data"]["items"][0]["quantity"], 3);
    assert_eq!(body["data"]["total"], 75.0);
}

#[tokio::test]
async fn test_checkout_creates_pending_order_and_reserves_stock() {
    let app = setup_test_app().await;
    let admin = register_admin(&app).await;
    let user = register_test_user(&app, None).await;
    let product_id = create_product(&app, &admin, 19.99, 5).await;
    add_to_cart(&app, &user, &product_id, 2).await;

    let response = app
        .client()
        .post(&api_path("/store/checkout"))
        .add_header("Authorization", user.bearer())
        .await;

    assert_eq!(response.status_code(), 201, "{}", response.text());
    let order: Value = response.json();
    assert_eq!(order["data"]["status"], "pending");
    assert_eq!(order["data"]["total_amount"], 39.98);
    assert_eq!(order["data"]["items"].as_array().unwrap().len(), 1);

    let product: Value = app
        .client()
        .get(&api_path(&format!("/store/product/{}", product_id)))
        .add_header("Authorization", user.bearer())
        .await
        .json();
    assert_eq!(product["data"]["stock"], 3);

    let cart: Value = app
        .client()
        .get(&api_path("/store/cart"))
        .add_header("Authorization", user.bearer())
        .await
        .json();
    assert!(cart["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_with_empty_cart_fails() {
    let app = setup_test_app().await;
    let user = register_test_user(&app, None).await;

    let response = app
        .client()
        .post(&api_path("/store/checkout"))
        .add_header("Authorization", user.bearer())
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["message"], "Cart is empty");
}

#[tokio::test]
async fn test_checkout_uses_default_address() {
    let app = setup_test_app().await;
    let admin = register_admin(&app).await;
    let user = register_test_user(&app, None).await;
    let product_id = create_product(&app, &admin, 12.5, 2).await;
    add_to_cart(&app, &user, &product_id, 1).await;

    let response = app
        .client()
        .post(&api_path("/address"))
        .add_header("Authorization", user.bearer())
        .json(&json!({
            "street": "1 Studio Way",
            "city": "Lisbon",
            "postal_code": "1000-001",
            "country": "Portugal",
            "is_default": true
        }))
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    let address: Value = response.json();

    let order: Value = app
        .client()
        .post(&api_path("/store/checkout"))
        .add_header("Authorization", user.bearer())
        .await
        .json();

    assert_eq!(order["data"]["shipping_address_id"], address["data"]["id"]);
}

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let app = setup_test_app().await;
    let admin = register_admin(&app).await;
    let buyer = register_test_user(&app, None).await;
    let other = register_test_user(&app, None).await;
    let product_id = create_product(&app, &admin, 9.0, 1).await;
    add_to_cart(&app, &buyer, &product_id, 1).await;
    let order: Value = app
        .client()
        .post(&api_path("/store/checkout"))
        .add_header("Authorization", buyer.bearer())
        .await
        .json();

    let response = app
        .client()
        .get(&api_path(&format!(
            "/store/order/{}",
            order["data"]["id"].as_str().unwrap()
        )))
        .add_header("Authorization", other.bearer())
        .await;

    assert_eq!(response.status_code(), 404);
}
