//! Retry and deadline helpers shared by the HTTP and IRC paths.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::error::{Result, TwitchChatError};

/// Attempt numbers for a retried operation, starting at 1.
///
/// `None` (or zero) means the operation is retried without bound.
pub fn attempts(max_attempts: Option<u32>) -> Box<dyn Iterator<Item = u32> + Send> {
    match max_attempts {
        Some(max) if max > 0 => Box::new(1..=max),
        _ => Box::new(1..=u32::MAX),
    }
}

/// Waits out the retry delay, or fails with `RetriesExceeded` when the
/// attempt budget is already spent.
pub async fn retry(
    attempt: u32,
    max_attempts: Option<u32>,
    delay: Duration,
    error: &TwitchChatError,
) -> Result<()> {
    if let Some(max) = max_attempts {
        if attempt >= max {
            return Err(TwitchChatError::RetriesExceeded {
                attempts: attempt,
                last_error: error.to_string(),
            });
        }
    }
    warn!(attempt, ?delay, "Retrying after error: {error}");
    tokio::time::sleep(delay).await;
    Ok(())
}

/// Wall-clock budget for a whole retrieval.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    /// A deadline that never expires.
    pub fn none() -> Self {
        Self::new(None)
    }

    pub fn expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.start.elapsed() >= limit)
    }

    /// Errors with `TimeoutExceeded` once the budget is spent.
    pub fn check(&self) -> Result<()> {
        if self.expired() {
            return Err(TwitchChatError::timeout(format!(
                "Timeout of {:?} reached",
                self.limit.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

/// Runs `op` until it succeeds, sleeping `delay` between attempts.
///
/// Only retryable errors are swallowed; everything else propagates on the
/// spot. The deadline is checked before every attempt, so a retrieval with
/// an overall timeout cannot get stuck in a retry loop.
pub async fn run_with_retries<T, F, Fut>(
    max_attempts: Option<u32>,
    delay: Duration,
    deadline: &Deadline,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = attempts(max_attempts);
    loop {
        let attempt = tries.next().unwrap_or(u32::MAX);
        deadline.check()?;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => retry(attempt, max_attempts, delay, &err).await?,
            Err(err) => return Err(err),
        }
    }
}
