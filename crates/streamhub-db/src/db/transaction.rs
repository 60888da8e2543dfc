//! Database transaction utilities
//!
//! Multi-row writes (artist create/delete, follows, checkout, reconciliation,
//! webhook cascades) run inside `with_transaction`.

use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;
use streamhub_core::AppError;

/// Execute a closure within a database transaction
///
/// Begins a transaction, runs the closure with it, commits on `Ok` and rolls
/// back on `Err`. A failed rollback is logged and the original error returned.
///
/// ```ignore
/// with_transaction(&pool, |tx| {
///     Box::pin(async move {
///         sqlx::query("UPDATE ...").execute(&mut **tx).await?;
///         Ok(())
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<T, F>(pool: &PgPool, f: F) -> Result<T, AppError>
where
    F: for<'a> FnOnce(
        &'a mut Transaction<'_, Postgres>,
    ) -> Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>,
{
    let mut tx = pool.begin().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to begin transaction");
        AppError::Database(e)
    })?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to commit transaction");
                AppError::Database(e)
            })?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %e,
                    "Failed to rollback transaction"
                );
            }
            Err(e)
        }
    }
}
