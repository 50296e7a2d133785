//! Retry logic with exponential backoff
//!
//! Bounded retries for transient object-store failures (listing before the
//! result bucket exists, connection hiccups mid-fetch). Submit and
//! status-query errors never pass through here; they fail the request
//! immediately.

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (store not ready, network timeouts, connection reset)
/// should return `true`. Permanent failures (bad request, failed transform,
/// unsupported format) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // The store may not have created the request's bucket yet
            Error::StoreTransient(_) => true,
            // Network errors are retryable when they're timeouts or connect failures
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            // Connection-shaped I/O errors are retryable
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            // Everything else is permanent for the purposes of store retries
            _ => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Runs `operation` up to `1 + config.max_attempts` times. Between attempts
/// the delay grows by `backoff_multiplier` (capped at `max_delay`) with
/// optional jitter. A non-retryable error, or a retryable one once the
/// attempts are spent, is returned as-is.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= config.max_attempts {
            tracing::error!(
                error = %error,
                attempts = attempt + 1,
                retryable = error.is_retryable(),
                "Operation failed permanently"
            );
            return Err(error);
        }
        attempt += 1;

        tracing::warn!(
            error = %error,
            attempt = attempt,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Operation failed, retrying"
        );
        tokio::time::sleep(if config.jitter { add_jitter(delay) } else { delay }).await;
        delay = delay.mul_f64(config.backoff_multiplier).min(config.max_delay);
    }
}

/// Stretch a delay by a random factor in `[1.0, 2.0]` to spread out
/// simultaneous retriers
fn add_jitter(delay: Duration) -> Duration {
    delay.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..=1.0))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_success_no_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<&str, Error> = with_retry(&fast_config(3), || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<u32, Error> = with_retry(&fast_config(3), || {
            let calls = calls_clone.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::StoreTransient("bucket not ready".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), Error> = with_retry(&fast_config(3), || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::UnsupportedOutputFormat("forkme".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: Result<(), Error> = with_retry(&fast_config(2), || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::StoreTransient("still not ready".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        // Initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retryability_classification() {
        assert!(Error::StoreTransient("x".to_string()).is_retryable());
        assert!(
            Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "x"))
                .is_retryable()
        );
        assert!(!Error::FilesFailed {
            failed: 1,
            processed: 0
        }
        .is_retryable());
        assert!(!Error::UnknownRequestId("x".to_string()).is_retryable());
        assert!(
            !Error::SubmitFailed {
                status: 400,
                message: "bad".to_string()
            }
            .is_retryable()
        );
    }
}
