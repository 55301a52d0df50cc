//! Retry policy for chain reads.
//!
//! Every failure is treated as transient. The sleep between attempts is
//! constant: no backoff, no jitter. A policy either gives up after a fixed
//! number of attempts or never gives up at all.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::error;

/// How often and how long to retry a failing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` retries until success
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts.max(1)),
        }
    }
}

/// A bounded retry loop ran out of attempts
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy's attempt bound is reached.
///
/// Each failure is logged with `what` (operation + identifying parameters)
/// and followed by one sleep of `policy.interval`. No sleep follows the
/// final failed attempt of a bounded policy.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                error!("[rpc] {} failed (attempt {}): {}", what, attempt, e);
                if let Some(max) = policy.max_attempts {
                    if attempt >= max {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error: e,
                        });
                    }
                }
                sleep(policy.interval).await;
            }
        }
    }
}

/// Run `op` until it succeeds. Never returns an error.
pub async fn retry_forever<T, E, F, Fut>(interval: Duration, what: &str, mut op: F) -> T
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return value,
            Err(e) => {
                error!("[rpc] {} failed (attempt {}): {}", what, attempt, e);
                sleep(interval).await;
            }
        }
    }
}
