use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub category: Option<String>,
    pub stock: i32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = f64)]
    pub price: Decimal,
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Decimal>,
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    #[schema(value_type = f64)]
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock: i32,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
    #[schema(value_type = f64)]
    pub total: Decimal,
}

impl CartView {
    pub fn new(items: Vec<CartLine>) -> Self {
        let total = order_total(&items);
        Self { items, total }
    }
}

pub fn order_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::subtotal).sum()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "order_status", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub shipping_address_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    #[schema(value_type = f64)]
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub shipping_address_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(price: &str, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            name: "tee".to_string(),
            unit_price: Decimal::from_str(price).unwrap(),
            quantity,
            stock: 10,
        }
    }

    #[test]
    fn totals_are_exact_decimals() {
        let lines = vec![line("19.99", 3), line("0.10", 1), line("0.20", 1)];
        assert_eq!(order_total(&lines), Decimal::from_str("60.27").unwrap());
    }

    #[test]
    fn empty_cart_totals_zero() {
        assert_eq!(CartView::new(vec![]).total, Decimal::ZERO);
    }
}
