//! Merchandise catalog, cart and orders.

use crate::auth::models::AuthUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use streamhub_core::models::{
    AddToCartRequest, CartView, CheckoutRequest, CreateProductRequest, OrderWithItems,
    UpdateProductRequest,
};
use streamhub_core::{AppError, Capability};
use streamhub_db::{NewProduct, ProductPatch};
use uuid::Uuid;

const PRODUCT_NOT_FOUND: &str = "Product not found";

fn ensure_positive_price(price: Decimal) -> Result<(), AppError> {
    if price <= Decimal::ZERO {
        return Err(AppError::InvalidInput(
            "price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ----- Products -----

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, operation = "create_product"))]
pub async fn create_product(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateProductRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    auth_user.require(Capability::ManageProducts)?;
    ensure_positive_price(request.price)?;

    let product = state
        .db
        .store
        .create_product(NewProduct {
            name: request.name,
            description: request.description,
            price: request.price,
            category: request.category,
            stock: request.stock,
            images: request.images,
        })
        .await?;
    tracing::info!(product_id = %product.id, "Product created");
    Ok(ApiResponse::created("Product created", product))
}

#[tracing::instrument(skip(state, request), fields(user_id = %auth_user.user_id, product_id = %id))]
pub async fn update_product(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateProductRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    auth_user.require(Capability::ManageProducts)?;
    if let Some(price) = request.price {
        ensure_positive_price(price)?;
    }

    let patch = ProductPatch {
        name: request.name,
        description: request.description,
        price: request.price,
        category: request.category,
        stock: request.stock,
        images: request.images,
    };
    let product = state
        .db
        .store
        .update_product(id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;
    Ok(ApiResponse::ok("Product updated", product))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, product_id = %id))]
pub async fn delete_product(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    auth_user.require(Capability::ManageProducts)?;
    if !state.db.store.deactivate_product(id).await? {
        return Err(AppError::NotFound(PRODUCT_NOT_FOUND.to_string()).into());
    }
    Ok(ApiResponse::message("Product deleted"))
}

#[tracing::instrument(skip(state, _auth_user))]
pub async fn list_products(
    _auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let products = state.db.store.list_products().await?;
    Ok(ApiResponse::ok("Products fetched", products))
}

#[tracing::instrument(skip(state, _auth_user), fields(product_id = %id))]
pub async fn get_product(
    _auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let product = state
        .db
        .store
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;
    Ok(ApiResponse::ok("Product fetched", product))
}

// ----- Cart -----

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn get_cart(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let lines = state.db.store.cart_lines(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Cart fetched", CartView::new(lines)))
}

#[tracing::instrument(
    skip(state, request),
    fields(user_id = %auth_user.user_id, product_id = %request.product_id, quantity = request.quantity)
)]
pub async fn add_to_cart(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<AddToCartRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let product = state
        .db
        .store
        .find_product(request.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;

    let in_cart = state
        .db
        .store
        .cart_quantity(auth_user.user_id, product.id)
        .await?;
    if in_cart + request.quantity > product.stock {
        return Err(AppError::BadRequest(format!(
            "Only {} of {} in stock",
            product.stock, product.name
        ))
        .into());
    }

    state
        .db
        .store
        .add_to_cart(auth_user.user_id, product.id, request.quantity, product.price)
        .await?;
    let lines = state.db.store.cart_lines(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Added to cart", CartView::new(lines)))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, product_id = %product_id))]
pub async fn remove_from_cart(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !state
        .db
        .store
        .remove_from_cart(auth_user.user_id, product_id)
        .await?
    {
        return Err(AppError::NotFound("Product is not in the cart".to_string()).into());
    }
    let lines = state.db.store.cart_lines(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Removed from cart", CartView::new(lines)))
}

// ----- Orders -----

#[tracing::instrument(skip(state, body), fields(user_id = %auth_user.user_id, operation = "checkout"))]
pub async fn checkout(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    // The body is optional; without one the default address is used.
    let request: CheckoutRequest = if body.is_empty() {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid request body: {}", e)))?
    };

    let shipping_address_id = match request.shipping_address_id {
        Some(id) => Some(
            state
                .db
                .addresses
                .find(id, auth_user.user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Address not found".to_string()))?
                .id,
        ),
        None => state
            .db
            .addresses
            .find_default(auth_user.user_id)
            .await?
            .map(|a| a.id),
    };

    let order = state
        .db
        .store
        .checkout(auth_user.user_id, shipping_address_id)
        .await?;
    tracing::info!(order_id = %order.order.id, total = %order.order.total_amount, "Order placed");
    Ok(ApiResponse::created("Order placed", order))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id))]
pub async fn order_history(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let orders = state.db.store.list_orders(auth_user.user_id).await?;
    Ok(ApiResponse::ok("Orders fetched", orders))
}

#[tracing::instrument(skip(state), fields(user_id = %auth_user.user_id, order_id = %order_id))]
pub async fn get_order(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let order = state
        .db
        .store
        .find_order(order_id, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    let items = state.db.store.order_items(order.id).await?;
    Ok(ApiResponse::ok("Order fetched", OrderWithItems { order, items }))
}
