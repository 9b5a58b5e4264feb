//! Retry wrapper for generative-model calls
//!
//! Retries are decided purely on the error text: only errors mentioning one
//! of [`RETRYABLE_ERROR_MARKERS`] are attempted again.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;

/// Case-insensitive substrings that mark an error as transient
pub const RETRYABLE_ERROR_MARKERS: &[&str] =
    &["503", "overloaded", "429", "rate limit", "network", "timeout"];

/// Upper bound for a single backoff delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// How often and how patiently a model call is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of invocations, first attempt included (at least 1)
    pub max_retries: usize,
    /// Delay before the second attempt; doubles for each one after that
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Number of times the call may be invoked
    pub fn max_attempts(&self) -> usize {
        self.max_retries.max(1)
    }

    /// Backoff delays between attempts: `base`, `2 * base`, `4 * base`, ...
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        (0..self.max_attempts() - 1).map(move |n| {
            let factor = 2u32.saturating_pow(u32::try_from(n).unwrap_or(u32::MAX));
            base.saturating_mul(factor).min(MAX_RETRY_DELAY)
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Whether an error message describes a transient failure
pub fn is_retryable_message(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRYABLE_ERROR_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Run `action`, retrying transient failures with exponential backoff
///
/// `action` is invoked at most `policy.max_attempts()` times. The last error
/// is returned once attempts run out or a non-retryable error occurs.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, operation: &str, mut action: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = AtomicUsize::new(0);
    let max_attempts = policy.max_attempts();

    RetryIf::spawn(
        policy.delays(),
        || {
            attempts.fetch_add(1, Ordering::Relaxed);
            action()
        },
        |e: &E| {
            let attempt = attempts.load(Ordering::Relaxed);
            let message = e.to_string();
            let retryable = is_retryable_message(&message);

            if retryable && attempt < max_attempts {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    error = %message,
                    "Transient model error - will retry"
                );
            } else {
                tracing::warn!(
                    operation,
                    attempt,
                    retryable,
                    error = %message,
                    "Model call failed - giving up"
                );
            }

            retryable
        },
    )
    .await
}
