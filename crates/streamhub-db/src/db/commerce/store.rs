use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use streamhub_core::models::{
    order_total, CartLine, Order, OrderItem, OrderStatus, OrderWithItems, Product,
};
use streamhub_core::AppError;
use uuid::Uuid;

use crate::db::transaction::with_transaction;

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, category, stock, images, is_active, created_at, updated_at";

const ORDER_COLUMNS: &str =
    "id, user_id, total_amount, status, shipping_address_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category: Option<String>,
    pub stock: i32,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
}

/// Cart line joined with its product, locked during checkout.
#[derive(Debug, FromRow)]
struct LockedLine {
    product_id: Uuid,
    name: String,
    unit_price: Decimal,
    quantity: i32,
    stock: i32,
    is_active: bool,
}

/// Products, carts and orders.
#[derive(Clone)]
pub struct StoreRepository {
    pool: PgPool,
}

impl StoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_product(&self, product: NewProduct) -> Result<Product, AppError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (id, name, description, price, category, stock, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.category)
        .bind(product.stock)
        .bind(&product.images)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_product(
        &self,
        id: Uuid,
        patch: ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                category = COALESCE($5, category),
                stock = COALESCE($6, stock),
                images = COALESCE($7, images),
                updated_at = NOW()
            WHERE id = $1 AND is_active
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(patch.name)
        .bind(patch.description)
        .bind(patch.price)
        .bind(patch.category)
        .bind(patch.stock)
        .bind(patch.images)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn deactivate_product(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE products SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE is_active ORDER BY created_at DESC",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_product(&self, id: Uuid) -> Result<Option<Product>, AppError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1 AND is_active",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn cart_quantity(&self, user_id: Uuid, product_id: Uuid) -> Result<i32, AppError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(quantity.unwrap_or(0))
    }

    /// Add to the cart, merging into an existing line.
    pub async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        price: Decimal,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity, price_at_add)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity,
                price_at_add = EXCLUDED.price_at_add
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_from_cart(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cart lines priced at the product's current price.
    pub async fn cart_lines(&self, user_id: Uuid) -> Result<Vec<CartLine>, AppError> {
        let rows = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT c.product_id, p.name, p.price AS unit_price, c.quantity, p.stock
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.added_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Turn the cart into a pending order: lock products, check and decrement
    /// stock, copy current prices, clear the cart.
    pub async fn checkout(
        &self,
        user_id: Uuid,
        shipping_address_id: Option<Uuid>,
    ) -> Result<OrderWithItems, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let locked = sqlx::query_as::<_, LockedLine>(
                    r#"
                    SELECT c.product_id, p.name, p.price AS unit_price, c.quantity, p.stock, p.is_active
                    FROM cart_items c
                    JOIN products p ON p.id = c.product_id
                    WHERE c.user_id = $1
                    ORDER BY p.id
                    FOR UPDATE OF p
                    "#,
                )
                .bind(user_id)
                .fetch_all(&mut **tx)
                .await?;

                if locked.is_empty() {
                    return Err(AppError::BadRequest("Cart is empty".to_string()));
                }

                if let Some(line) = locked.iter().find(|l| !l.is_active) {
                    return Err(AppError::BadRequest(format!(
                        "Product is no longer available: {}",
                        line.name
                    )));
                }
                if let Some(line) = locked.iter().find(|l| l.stock < l.quantity) {
                    return Err(AppError::BadRequest(format!(
                        "Insufficient stock for {}",
                        line.name
                    )));
                }

                let lines: Vec<CartLine> = locked
                    .into_iter()
                    .map(|l| CartLine {
                        product_id: l.product_id,
                        name: l.name,
                        unit_price: l.unit_price,
                        quantity: l.quantity,
                        stock: l.stock,
                    })
                    .collect();
                let total = order_total(&lines);

                let order = sqlx::query_as::<_, Order>(&format!(
                    r#"
                    INSERT INTO orders (id, user_id, total_amount, status, shipping_address_id)
                    VALUES ($1, $2, $3, 'pending', $4)
                    RETURNING {}
                    "#,
                    ORDER_COLUMNS
                ))
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(total)
                .bind(shipping_address_id)
                .fetch_one(&mut **tx)
                .await?;

                for line in &lines {
                    sqlx::query(
                        r#"
                        INSERT INTO order_items (order_id, product_id, quantity, unit_price)
                        VALUES ($1, $2, $3, $4)
                        "#,
                    )
                    .bind(order.id)
                    .bind(line.product_id)
                    .bind(line.quantity)
                    .bind(line.unit_price)
                    .execute(&mut **tx)
                    .await?;

                    sqlx::query(
                        "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1",
                    )
                    .bind(line.product_id)
                    .bind(line.quantity)
                    .execute(&mut **tx)
                    .await?;
                }

                sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                    .bind(user_id)
                    .execute(&mut **tx)
                    .await?;

                let items = lines
                    .into_iter()
                    .map(|l| OrderItem {
                        product_id: l.product_id,
                        name: l.name,
                        quantity: l.quantity,
                        unit_price: l.unit_price,
                    })
                    .collect();

                Ok(OrderWithItems { order, items })
            })
        })
        .await
    }

    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, AppError> {
        let rows = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_order(&self, id: Uuid, user_id: Uuid) -> Result<Option<Order>, AppError> {
        let row = sqlx::query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE id = $1 AND user_id = $2",
            ORDER_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, AppError> {
        let rows = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT oi.product_id, p.name, oi.quantity, oi.unit_price
            FROM order_items oi
            JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Move a pending order to `status`. Returns false when it was no longer pending.
    pub async fn settle_order_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(status)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel an order that is not already cancelled and return its items to stock.
    pub async fn cancel_and_restock_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE products p SET stock = p.stock + oi.quantity, updated_at = NOW()
            FROM order_items oi
            WHERE oi.order_id = $1 AND oi.product_id = p.id
            "#,
        )
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        Ok(true)
    }
}
