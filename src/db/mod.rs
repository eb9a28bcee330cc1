//! `PostgreSQL` persistence for the catalog sync.
//!
//! # Tables
//!
//! - `partner_tokens` - bearer tokens, read by [`PgTokenStore`]
//! - `catalog_items` - top-level catalog entries
//! - `catalog_variants` - variants of catalog entries
//!
//! Both catalog tables are unique on `(shop_id, entity_id)` and written only
//! through [`UpsertBatcher`].
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded as [`MIGRATOR`]:
//!
//! ```rust,ignore
//! let pool = partner_sync::db::create_pool(&DatabaseConfig::from_env()?).await?;
//! partner_sync::db::run_migrations(&pool).await?;
//! ```

mod records;
mod token_store;
mod upsert;

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::config::DatabaseConfig;

pub use records::{CatalogRecord, CatalogTable};
pub use token_store::PgTokenStore;
pub use upsert::{
    build_upsert_sql, BatchJob, ChunkWriter, PgCatalogStore, UpsertBatcher, UpsertError,
    UpsertReport, DEFAULT_BATCH_SIZE,
};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Delay before the single retry of a transient database failure.
pub const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Applying migrations failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl DatabaseError {
    /// Returns `true` for failures worth one retry: connection resets,
    /// timeouts, broken pipes, pool acquisition timeouts and SQLSTATE
    /// class 08 (connection exception) or server shutdown.
    ///
    /// Constraint violations and malformed queries are not transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        let Self::Sqlx(error) = self else {
            return false;
        };
        match error {
            sqlx::Error::Io(io) => matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::TimedOut
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ),
            sqlx::Error::PoolTimedOut => true,
            sqlx::Error::Database(db) => db
                .code()
                .is_some_and(|code| code.starts_with("08") || code == "57P01"),
            _ => false,
        }
    }
}

/// Runs `op`, retrying it once after [`TRANSIENT_RETRY_DELAY`] if the first
/// attempt fails with a transient error.
///
/// # Errors
///
/// Returns the first non-transient error, or the second attempt's error.
pub async fn retry_transient_once<T, F, Fut>(operation: &str, mut op: F) -> Result<T, DatabaseError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DatabaseError>>,
{
    match op().await {
        Err(error) if error.is_transient() => {
            tracing::warn!(operation, %error, "transient database error, retrying once");
            tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
            op().await
        }
        other => other,
    }
}

/// Applies the embedded migrations to `pool`.
///
/// # Errors
///
/// Returns `DatabaseError::Migrate` if a migration fails or has been altered
/// since it was applied.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    MIGRATOR.run(pool).await?;
    tracing::info!("catalog migrations applied");
    Ok(())
}

/// Create a bounded `PostgreSQL` connection pool.
///
/// Callers beyond `max_connections` queue for up to the acquire timeout
/// instead of failing outright; idle connections are closed after the idle
/// timeout.
///
/// # Errors
///
/// Returns `DatabaseError::Sqlx` if the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections())
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(Some(config.idle_timeout()))
        .connect(config.url())
        .await?;
    tracing::info!(
        max_connections = config.max_connections(),
        "connected to catalog database"
    );
    Ok(pool)
}

/// Waits for Ctrl-C (or SIGTERM on unix) and then closes `pool`.
///
/// Closing waits for checked-out connections to be returned; a transaction
/// that cannot finish is aborted by the server and never becomes visible.
pub async fn close_pool_on_shutdown(pool: PgPool) {
    shutdown_signal().await;
    tracing::info!("shutdown signal received, closing database pool");
    pool.close().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn io_error(kind: ErrorKind) -> DatabaseError {
        DatabaseError::Sqlx(sqlx::Error::Io(std::io::Error::new(kind, "simulated")))
    }

    #[test]
    fn test_transient_classification() {
        assert!(io_error(ErrorKind::ConnectionReset).is_transient());
        assert!(io_error(ErrorKind::TimedOut).is_transient());
        assert!(io_error(ErrorKind::BrokenPipe).is_transient());
        assert!(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut).is_transient());

        assert!(!io_error(ErrorKind::PermissionDenied).is_transient());
        assert!(!DatabaseError::Sqlx(sqlx::Error::RowNotFound).is_transient());
        assert!(!DatabaseError::Migrate(sqlx::migrate::MigrateError::VersionMissing(1))
            .is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_once_retries_exactly_once() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), DatabaseError> = retry_transient_once("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(io_error(ErrorKind::ConnectionReset)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_transient_once_recovers() {
        let attempts = AtomicUsize::new(0);
        let result = retry_transient_once("test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(io_error(ErrorKind::TimedOut))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_retry_transient_once_propagates_permanent_errors() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), DatabaseError> = retry_transient_once("test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(DatabaseError::Sqlx(sqlx::Error::RowNotFound)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
