//! Retry logic with exponential backoff
//!
//! Segment fetches retry inside their own bounded loop. A fetch that keeps failing
//! is reported once, after the last attempt, and is never re-queued from here.
//!
//! # Example
//!
//! ```no_run
//! use segment_dl::retry::{IsRetryable, download_with_retry};
//! use segment_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = download_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, non-2xx answers, empty bodies) should return `true`.
/// Permanent failures (disk full, bad configuration) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Timeouts, refused connections and truncated bodies all count;
            // only a request we could not even build is permanent
            Error::Network(e) => !e.is_builder(),
            // The backend may simply not have produced the segment yet
            Error::Http { .. } => true,
            // Partial file is already removed by the fetcher
            Error::EmptySegment { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Config { .. }
            | Error::InvalidAssetId(_)
            | Error::Serialization(_)
            | Error::Assembly(_)
            | Error::NotSupported(_)
            | Error::Cancelled => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation runs at most `config.max_attempts + 1` times. Between attempts the
/// delay starts at `initial_delay` and is multiplied by `backoff_multiplier`, capped
/// at `max_delay`.
///
/// # Returns
///
/// Returns the successful result or the last error after all retry attempts are exhausted.
pub async fn download_with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    download_with_retry_cancellable(config, &CancellationToken::new(), operation)
        .await
        .result
}

/// How a cancellable retry loop ended
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Successful value, or the error of the last attempt that ran
    pub result: Result<T, E>,
    /// True when cancellation cut a backoff sleep short, so the retry budget
    /// was not spent
    pub cancelled: bool,
}

/// Like [`download_with_retry`], but stops retrying once `cancel_token` fires.
///
/// An attempt that is already running is allowed to finish. If the token fires
/// during a backoff sleep, the sleep is cut short, the last error is returned and
/// [`RetryOutcome::cancelled`] is set. An error that exhausts the budget or is not
/// retryable is never marked cancelled, even if the token has fired meanwhile.
pub async fn download_with_retry_cancellable<F, Fut, T, E>(
    config: &RetryConfig,
    cancel_token: &CancellationToken,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(result),
                    cancelled: false,
                };
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::select! {
                    _ = tokio::time::sleep(jittered_delay) => {}
                    _ = cancel_token.cancelled() => {
                        tracing::info!(
                            error = %e,
                            attempts = attempt,
                            "Retry abandoned, cancellation requested"
                        );
                        return RetryOutcome {
                            result: Err(e),
                            cancelled: true,
                        };
                    }
                }

                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed with non-retryable error"
                    );
                }
                return RetryOutcome {
                    result: Err(e),
                    cancelled: false,
                };
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, saturating at `max_delay`
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::try_from_secs_f64(jittered_secs).unwrap_or(delay)
}
