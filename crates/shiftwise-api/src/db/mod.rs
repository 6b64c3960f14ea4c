//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, the API
//! persists every record to PostgreSQL. When absent, the API operates in
//! in-memory-only mode (suitable for development and testing).
//!
//! ## Authority
//!
//! - Cover-ups (`cover_ups`) and swap proposals (`swaps`) are read and
//!   sealed directly in Postgres. Their transitions are conditional
//!   `UPDATE`s returning a [`Conditional`].
//! - Everything else is served from memory; these modules write through on
//!   change and load everything back on startup.

pub mod announcements;
pub mod attendance;
pub mod cover_ups;
pub mod employees;
pub mod inquiries;
pub mod leaves;
pub mod notifications;
pub mod payroll;
pub mod shifts;
pub mod swaps;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Outcome of a conditional update on one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional<T, S> {
    /// The precondition held and the row was updated.
    Applied(T),
    /// The row exists but the precondition did not hold; carries what was observed.
    Refused(S),
    /// No such row.
    Missing,
}

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// A stored value that does not map back onto a domain type.
pub(crate) fn corrupt(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    tracing::error!(error = %err, "stored row failed validation");
    sqlx::Error::Decode(Box::new(err))
}

/// A stored enum column held an unknown value.
pub(crate) fn unknown_value(column: &'static str, value: &str) -> sqlx::Error {
    tracing::error!(column, value, "unknown value in enum column");
    sqlx::Error::Decode(format!("unknown {column} value {value:?}").into())
}
