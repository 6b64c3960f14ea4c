//! # Lock Timeouts and Busy Retries
//!
//! Claims, cancellations and decisions wait at most `lock_timeout` for their
//! record lock. Postgres enforces this with `SET LOCAL lock_timeout`; the
//! in-memory store with `try_write_for`. An attempt that times out is
//! reported as busy and retried a bounded number of times with linear
//! backoff before the caller sees it.

use std::future::Future;
use std::time::Duration;

use sqlx::{PgConnection, Postgres, Transaction};

use crate::state::AppConfig;

/// Errors that may signal a transient lock timeout.
pub trait Contended {
    /// Whether retrying the same operation could succeed.
    fn is_busy(&self) -> bool;
}

/// Bounded retry of busy attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub lock_timeout: Duration,
    pub busy_retries: u32,
    pub busy_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lock_timeout: config.lock_timeout,
            busy_retries: config.busy_retries,
            busy_backoff: config.busy_backoff,
        }
    }

    /// Run `attempt` until it returns something other than a busy error, or
    /// the retries are exhausted.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, E>
    where
        E: Contended + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut retry = 0;
        loop {
            match attempt().await {
                Err(e) if e.is_busy() && retry < self.busy_retries => {
                    retry += 1;
                    tracing::warn!(
                        operation,
                        retry,
                        max_retries = self.busy_retries,
                        error = %e,
                        "record lock busy, retrying"
                    );
                    tokio::time::sleep(self.busy_backoff * retry).await;
                }
                other => return other,
            }
        }
    }

    /// The statement limiting lock waits for the rest of a transaction.
    ///
    /// `SET` does not accept bind parameters; the value is an integer.
    pub fn pg_lock_timeout_statement(&self) -> String {
        format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis().max(1)
        )
    }

    /// Open a transaction whose lock waits are bounded by `lock_timeout`.
    pub async fn begin(
        &self,
        pool: &sqlx::PgPool,
    ) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        apply_statement(&mut *tx, &self.pg_lock_timeout_statement()).await?;
        Ok(tx)
    }
}

async fn apply_statement(conn: &mut PgConnection, statement: &str) -> Result<(), sqlx::Error> {
    sqlx::query(statement).execute(conn).await?;
    Ok(())
}

/// Whether a database error means "could not get the lock in time".
///
/// `55P03` is `lock_not_available` (raised by `lock_timeout`), `40001` and
/// `40P01` are serialization failure and deadlock. Pool exhaustion counts too.
pub fn is_busy_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("55P03") | Some("40001") | Some("40P01")
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Busy,
        Fatal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Contended for TestError {
        fn is_busy(&self) -> bool {
            matches!(self, Self::Busy)
        }
    }

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            lock_timeout: Duration::from_millis(10),
            busy_retries: retries,
            busy_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn busy_is_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = policy(3)
            .run("test", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError::Busy)
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn busy_surfaces_after_retries_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = policy(2)
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Busy) }
            })
            .await;
        assert_eq!(result, Err(TestError::Busy));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = policy(5)
            .run("test", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            })
            .await;
        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lock_timeout_statement_uses_milliseconds() {
        assert_eq!(
            policy(0).pg_lock_timeout_statement(),
            "SET LOCAL lock_timeout = '10ms'"
        );
    }

    #[test]
    fn pool_timeout_counts_as_busy() {
        assert!(is_busy_sqlx(&sqlx::Error::PoolTimedOut));
        assert!(!is_busy_sqlx(&sqlx::Error::RowNotFound));
    }
}
