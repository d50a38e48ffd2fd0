//! Bounded fixed-delay retry for backend calls.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use tracing::warn;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Retry an async operation with a fixed delay between attempts.
///
/// `attempt` receives the 1-based attempt number and is called up to
/// `policy.max_attempts` times. There is no wait after the final failure.
///
/// `wrap_exhausted` receives the attempt count and the last error and
/// converts them into the caller's `RetriesExhausted` variant.
pub async fn retry_with_delay<T, E, Fut, F, W>(
    policy: RetryPolicy,
    mut attempt: F,
    wrap_exhausted: W,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    W: FnOnce(u32, E) -> E,
{
    let mut backoff = Constant::new(policy.delay);
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match attempt(attempts).await {
            Ok(value) => return Ok(value),
            Err(e) if attempts >= max_attempts => return Err(wrap_exhausted(attempts, e)),
            Err(e) => {
                warn!("Attempt {}/{} failed: {}", attempts, max_attempts, e);
                if let Some(wait_duration) = backoff.next_backoff() {
                    tokio::time::sleep(wait_duration).await;
                }
            }
        }
    }
}
