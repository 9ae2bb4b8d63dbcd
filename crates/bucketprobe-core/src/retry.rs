//! Bounded retry with a fixed delay.
//!
//! IAM and S3 are eventually consistent: a freshly created role may not be
//! assumable yet, and a freshly attached policy may not be enforced yet. The
//! harness absorbs that lag with [`retry`], a small combinator parameterized by
//! a [`RetryPolicy`] (attempt budget and fixed delay). On exhaustion it returns
//! the last error.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Attempt budget and fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay between two consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Role assumption: 3 attempts, 5 seconds apart.
    pub const ASSUME_ROLE: Self = Self::new(3, Duration::from_secs(5));
    /// Scoped-role PUT: 4 attempts, 3 seconds apart.
    pub const PUT_OBJECT: Self = Self::new(4, Duration::from_secs(3));
    /// Scoped-role GET: 3 attempts, 5 seconds apart.
    pub const GET_OBJECT: Self = Self::new(3, Duration::from_secs(5));

    /// Create a new policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt with no delay.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Same attempt budget, no delay.
    #[must_use]
    pub const fn without_delay(self) -> Self {
        Self::new(self.max_attempts, Duration::ZERO)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Error returned when every attempt failed.
#[derive(Debug)]
pub struct RetryError<E> {
    /// Number of attempts made.
    pub attempts: u32,
    /// The error returned by the final attempt.
    pub last: E,
}

impl<E> RetryError<E> {
    /// Discard the attempt count and return the last error.
    pub fn into_last(self) -> E {
        self.last
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.last
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Run `op` until it succeeds or the policy's attempt budget is spent.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(
    description: &str,
    policy: RetryPolicy,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_if(description, policy, op, |_| true).await
}

/// Like [`retry`], but stops early when `should_retry` rejects an error.
pub async fn retry_if<T, E, F, Fut, P>(
    description: &str,
    policy: RetryPolicy,
    mut op: F,
    should_retry: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let max = policy.attempts();
    let mut attempt = 1;
    loop {
        debug!(description, attempt, max, "attempting");
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max || !should_retry(&err) {
                    return Err(RetryError {
                        attempts: attempt,
                        last: err,
                    });
                }
                warn!(
                    description,
                    attempt,
                    max,
                    error = %err,
                    delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
                    "attempt failed, retrying"
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
        }
    }
}
