//! Database transaction utilities

use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;
use veda_core::AppError;

/// Execute a closure within a database transaction
///
/// Commits when the closure returns `Ok`, rolls back otherwise.
///
/// ```ignore
/// use veda_db::with_transaction;
///
/// async fn example(pool: &sqlx::PgPool) -> Result<(), veda_core::AppError> {
///     with_transaction(pool, |tx| Box::pin(async move {
///         sqlx::query("UPDATE ...").execute(&mut **tx).await?;
///         Ok(())
///     })).await
/// }
/// ```
pub async fn with_transaction<F, R>(pool: &PgPool, f: F) -> Result<R, AppError>
where
    F: for<'a> FnOnce(
        &'a mut Transaction<'static, Postgres>,
    ) -> Pin<Box<dyn Future<Output = Result<R, AppError>> + Send + 'a>>,
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
                tracing::warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(e)
        }
    }
}
