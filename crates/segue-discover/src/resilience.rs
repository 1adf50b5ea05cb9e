//! Resilience primitives for the source clients.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use backon::{ConstantBuilder, ExponentialBuilder, Retryable};
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};

/// Bounded retry with an optional exponential backoff.
///
/// `max_attempts` counts the first call, so a policy of 3 makes at most
/// three calls in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
    pub backoff: bool,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            backoff: false,
        }
    }

    /// Fixed delay between attempts.
    pub const fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: false,
        }
    }

    /// Delay doubling after each attempt.
    pub const fn exponential(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: true,
        }
    }

    const fn retries(&self) -> usize {
        self.max_attempts.saturating_sub(1)
    }

    /// Run `op`, calling it again while its error satisfies `when`.
    pub async fn retry<T, E, F, Fut, W>(&self, op: F, when: W) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        W: FnMut(&E) -> bool,
        E: Display,
    {
        let notify = |err: &E, dur: Duration| {
            log::debug!("Retrying in {dur:?} after: {err}");
        };

        if self.backoff {
            op.retry(
                ExponentialBuilder::default()
                    .with_min_delay(self.delay)
                    .with_max_times(self.retries()),
            )
            .sleep(tokio::time::sleep)
            .when(when)
            .notify(notify)
            .await
        } else {
            op.retry(
                ConstantBuilder::default()
                    .with_delay(self.delay)
                    .with_max_times(self.retries()),
            )
            .sleep(tokio::time::sleep)
            .when(when)
            .notify(notify)
            .await
        }
    }

    /// Run `op` until its value satisfies `accept`.
    ///
    /// Errors are returned immediately. When attempts run out the last
    /// value is returned even though it was not accepted.
    pub async fn retry_until<T, E, F, Fut, A>(&self, mut op: F, accept: A) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Fn(&T) -> bool,
    {
        let accept = &accept;
        let attempt = || {
            let fut = op();
            async move {
                match fut.await {
                    Ok(value) if accept(&value) => Ok(value),
                    Ok(value) => Err(Polled::Rejected(value)),
                    Err(e) => Err(Polled::Failed(e)),
                }
            }
        };

        match self
            .retry(attempt, |outcome: &Polled<T, E>| {
                matches!(outcome, Polled::Rejected(_))
            })
            .await
        {
            Ok(value) | Err(Polled::Rejected(value)) => Ok(value),
            Err(Polled::Failed(e)) => Err(e),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(500))
    }
}

enum Polled<T, E> {
    Rejected(T),
    Failed(E),
}

impl<T, E> Display for Polled<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(_) => f.write_str("value not accepted yet"),
            Self::Failed(_) => f.write_str("operation failed"),
        }
    }
}

/// Per-source rate limiter.
///
/// Limits throughput to a configurable number of requests per second by
/// combining a single-permit [`Semaphore`] with a fixed sleep interval.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    interval: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` that allows at most
    /// `requests_per_second` requests per second.
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            interval: Duration::from_millis(1000 / u64::from(requests_per_second.max(1))),
        }
    }

    /// Waits until a request slot is available, then holds the slot for
    /// the configured interval.
    pub async fn acquire(&self) {
        // The semaphore is never closed.
        if let Ok(_permit) = self.semaphore.acquire().await {
            sleep(self.interval).await;
        }
    }
}
