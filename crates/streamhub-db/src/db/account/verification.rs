use chrono::{DateTime, Utc};
use sqlx::PgPool;
use streamhub_core::models::{VerificationCode, VerificationPurpose};
use streamhub_core::AppError;
use uuid::Uuid;

/// One outstanding code per (user, purpose); storing a new one replaces the old.
#[derive(Clone)]
pub struct VerificationCodeRepository {
    pool: PgPool,
}

impl VerificationCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn store(
        &self,
        user_id: Uuid,
        purpose: VerificationPurpose,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO verification_codes (user_id, purpose, code, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, purpose)
            DO UPDATE SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .bind(code)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find(
        &self,
        user_id: Uuid,
        purpose: VerificationPurpose,
    ) -> Result<Option<VerificationCode>, AppError> {
        let code = sqlx::query_as::<_, VerificationCode>(
            r#"
            SELECT user_id, purpose, code, expires_at
            FROM verification_codes
            WHERE user_id = $1 AND purpose = $2
            "#,
        )
        .bind(user_id)
        .bind(purpose)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    pub async fn consume(&self, user_id: Uuid, purpose: VerificationPurpose) -> Result<(), AppError> {
        sqlx::query("DELETE FROM verification_codes WHERE user_id = $1 AND purpose = $2")
            .bind(user_id)
            .bind(purpose)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
