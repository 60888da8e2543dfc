use sqlx::PgPool;
use streamhub_core::models::Session;
use streamhub_core::AppError;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Session, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, ip_address, user_agent, is_active)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING id, user_id, ip_address, user_agent, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    /// True when the session is active and its user may still sign in.
    pub async fn is_valid(&self, session_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let valid: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT TRUE
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = $1 AND s.user_id = $2 AND s.is_active
              AND NOT u.is_deleted AND NOT u.is_banned
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(valid.unwrap_or(false))
    }

    /// Deactivate one session. Returns false when it was already inactive.
    pub async fn deactivate(&self, session_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = FALSE WHERE id = $1 AND user_id = $2 AND is_active",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
