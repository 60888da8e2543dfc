use sqlx::{PgPool, Postgres, Transaction};
use streamhub_core::models::{Address, CreateAddressRequest, UpdateAddressRequest};
use streamhub_core::AppError;
use uuid::Uuid;

use crate::db::transaction::with_transaction;

const ADDRESS_COLUMNS: &str = r#"
    id, user_id, street, city, state, postal_code, country, is_default, is_deleted, created_at, updated_at
"#;

/// Shipping addresses. A user with at least one address always has exactly one default.
#[derive(Clone)]
pub struct AddressRepository {
    pool: PgPool,
}

async fn clear_default(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE addresses SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

impl AddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The first address becomes the default regardless of the request.
    pub async fn create(
        &self,
        user_id: Uuid,
        req: CreateAddressRequest,
    ) -> Result<Address, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let existing: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM addresses WHERE user_id = $1 AND NOT is_deleted",
                )
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;

                let make_default = req.is_default || existing == 0;
                if make_default {
                    clear_default(tx, user_id).await?;
                }

                let address = sqlx::query_as::<_, Address>(&format!(
                    r#"
                    INSERT INTO addresses (id, user_id, street, city, state, postal_code, country, is_default)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING {}
                    "#,
                    ADDRESS_COLUMNS
                ))
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(&req.street)
                .bind(&req.city)
                .bind(&req.state)
                .bind(&req.postal_code)
                .bind(&req.country)
                .bind(make_default)
                .fetch_one(&mut **tx)
                .await?;

                Ok(address)
            })
        })
        .await
    }

    /// Default first, then newest.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Address>, AppError> {
        let rows = sqlx::query_as::<_, Address>(&format!(
            r#"
            SELECT {} FROM addresses
            WHERE user_id = $1 AND NOT is_deleted
            ORDER BY is_default DESC, created_at DESC
            "#,
            ADDRESS_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find(&self, id: Uuid, user_id: Uuid) -> Result<Option<Address>, AppError> {
        let row = sqlx::query_as::<_, Address>(&format!(
            "SELECT {} FROM addresses WHERE id = $1 AND user_id = $2 AND NOT is_deleted",
            ADDRESS_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_default(&self, user_id: Uuid) -> Result<Option<Address>, AppError> {
        let row = sqlx::query_as::<_, Address>(&format!(
            "SELECT {} FROM addresses WHERE user_id = $1 AND is_default AND NOT is_deleted",
            ADDRESS_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: UpdateAddressRequest,
    ) -> Result<Option<Address>, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let owned: Option<bool> = sqlx::query_scalar(
                    "SELECT is_default FROM addresses WHERE id = $1 AND user_id = $2 AND NOT is_deleted FOR UPDATE",
                )
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

                if owned.is_none() {
                    return Ok(None);
                }
                if patch.is_default == Some(true) {
                    clear_default(tx, user_id).await?;
                }

                // Unsetting the default is ignored; a different address has to be made default instead.
                let make_default = patch.is_default == Some(true) || owned == Some(true);

                let row = sqlx::query_as::<_, Address>(&format!(
                    r#"
                    UPDATE addresses SET
                        street = COALESCE($3, street),
                        city = COALESCE($4, city),
                        state = COALESCE($5, state),
                        postal_code = COALESCE($6, postal_code),
                        country = COALESCE($7, country),
                        is_default = $8,
                        updated_at = NOW()
                    WHERE id = $1 AND user_id = $2
                    RETURNING {}
                    "#,
                    ADDRESS_COLUMNS
                ))
                .bind(id)
                .bind(user_id)
                .bind(patch.street)
                .bind(patch.city)
                .bind(patch.state)
                .bind(patch.postal_code)
                .bind(patch.country)
                .bind(make_default)
                .fetch_one(&mut **tx)
                .await?;

                Ok(Some(row))
            })
        })
        .await
    }

    /// Soft delete. When the default goes, the newest remaining address takes over.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let was_default: Option<bool> = sqlx::query_scalar(
                    "SELECT is_default FROM addresses WHERE id = $1 AND user_id = $2 AND NOT is_deleted FOR UPDATE",
                )
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

                let Some(was_default) = was_default else {
                    return Ok(false);
                };

                sqlx::query(
                    "UPDATE addresses SET is_deleted = TRUE, is_default = FALSE, updated_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .execute(&mut **tx)
                .await?;

                if was_default {
                    sqlx::query(
                        r#"
                        UPDATE addresses SET is_default = TRUE, updated_at = NOW()
                        WHERE id = (
                            SELECT id FROM addresses
                            WHERE user_id = $1 AND NOT is_deleted
                            ORDER BY created_at DESC
                            LIMIT 1
                        )
                        "#,
                    )
                    .bind(user_id)
                    .execute(&mut **tx)
                    .await?;
                }

                Ok(true)
            })
        })
        .await
    }

    pub async fn set_default(&self, id: Uuid, user_id: Uuid) -> Result<Option<Address>, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let exists: Option<Uuid> = sqlx::query_scalar(
                    "SELECT id FROM addresses WHERE id = $1 AND user_id = $2 AND NOT is_deleted FOR UPDATE",
                )
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

                if exists.is_none() {
                    return Ok(None);
                }

                clear_default(tx, user_id).await?;

                let row = sqlx::query_as::<_, Address>(&format!(
                    r#"
                    UPDATE addresses SET is_default = TRUE, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ADDRESS_COLUMNS
                ))
                .bind(id)
                .fetch_one(&mut **tx)
                .await?;

                Ok(Some(row))
            })
        })
        .await
    }
}
