use sqlx::{PgPool, Postgres, Transaction};
use streamhub_core::models::{Role, User};
use streamhub_core::AppError;
use uuid::Uuid;

use crate::db::transaction::with_transaction;

const USER_COLUMNS: &str = r#"
    id, username, email, password_hash, role, country_code, phone_number,
    is_email_verified, is_phone_verified, is_deleted, is_banned, created_at, updated_at
"#;

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub country_code: Option<String>,
    pub phone_number: Option<String>,
    pub is_email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Lookup by email, ignoring deleted accounts.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = LOWER($1) AND NOT is_deleted",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_phone(
        &self,
        country_code: &str,
        phone_number: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users
            WHERE country_code = $1 AND phone_number = $2 AND NOT is_deleted
            LIMIT 1
            "#,
            USER_COLUMNS
        ))
        .bind(country_code)
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Insert the account and its empty profile row together.
    pub async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        with_transaction(&self.pool, |tx| {
            Box::pin(async move {
                let user = sqlx::query_as::<_, User>(&format!(
                    r#"
                    INSERT INTO users (
                        id, username, email, password_hash, role,
                        country_code, phone_number, is_email_verified
                    )
                    VALUES ($1, $2, LOWER($3), $4, $5, $6, $7, $8)
                    RETURNING {}
                    "#,
                    USER_COLUMNS
                ))
                .bind(Uuid::new_v4())
                .bind(&new_user.username)
                .bind(new_user.email.trim())
                .bind(&new_user.password_hash)
                .bind(new_user.role)
                .bind(&new_user.country_code)
                .bind(&new_user.phone_number)
                .bind(new_user.is_email_verified)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| AppError::from(e).conflict_on_unique("Email is already registered"))?;

                sqlx::query(
                    r#"
                    INSERT INTO user_profiles (user_id, first_name, last_name)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(user.id)
                .bind(&new_user.first_name)
                .bind(&new_user.last_name)
                .execute(&mut **tx)
                .await?;

                Ok(user)
            })
        })
        .await
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_email_verified(&self, id: Uuid) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET is_email_verified = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn mark_phone_verified(&self, id: Uuid) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET is_phone_verified = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn set_role_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        role: Role,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
