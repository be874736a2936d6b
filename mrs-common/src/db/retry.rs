//! Retry logic for transient SQLite lock errors
//!
//! Several workers claim jobs from the same database file; under WAL a writer
//! can still briefly see `SQLITE_BUSY`. Those errors are retried with
//! exponential backoff, anything else is returned immediately.

use crate::{Error, Result};
use std::time::{Duration, Instant};

/// Retry a database operation with exponential backoff until `max_wait_ms` elapses.
///
/// **Backoff Strategy:**
/// - Initial delay: 10ms
/// - Max delay: 1000ms
/// - Multiplier: 2.0
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_lock_error(&err) {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::Internal(format!(
                        "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                        attempt,
                        elapsed.as_millis(),
                        max_wait_ms
                    )));
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}

/// `SQLITE_BUSY` / `SQLITE_LOCKED`
fn is_lock_error(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => {
            let msg = db_err.to_string();
            msg.contains("database is locked") || msg.contains("database table is locked")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let result = retry_on_lock("test_op", 5000, || async { Ok::<i32, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_lock_error_fails_immediately() {
        let mut attempts = 0;

        let result = retry_on_lock("test_op", 5000, || {
            attempts += 1;
            async move { Err::<i32, Error>(Error::Internal("other error".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_lock_error_retries_until_deadline() {
        let mut attempts = 0;

        let result = retry_on_lock("test_op", 50, || {
            attempts += 1;
            async move {
                Err::<i32, Error>(Error::Database(sqlx::Error::Protocol(
                    "database is locked".to_string(),
                )))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Internal(_))));
        assert!(attempts > 1);
    }
}
