//! Bounded retry for awaiting a remote condition.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

/// Attempt budget and fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    /// Daemon readiness: 10 tries, 3 s apart.
    pub const DAEMON_READY: Self = Self {
        attempts: 10,
        interval: Duration::from_secs(3),
    };

    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// The budget ran out without the condition holding.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    /// Error from the last attempt that failed by erroring, if any.
    pub last: Option<anyhow::Error>,
}

/// Runs `check` until it returns `Ok(true)` or the budget is spent.
///
/// `check` receives the 1-based attempt number. An attempt that errors or
/// returns `Ok(false)` counts as failed and is followed by `policy.interval`
/// of sleep. Returns the number of attempts used on success.
///
/// # Errors
///
/// Returns [`RetryExhausted`] after `policy.attempts` failed attempts.
pub async fn wait_for<F, Fut>(policy: RetryPolicy, mut check: F) -> Result<u32, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut last = None;
    for attempt in 1..=policy.attempts {
        match check(attempt).await {
            Ok(true) => return Ok(attempt),
            Ok(false) => tracing::debug!(attempt, "condition not met"),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "check failed");
                last = Some(e);
            }
        }
        tokio::time::sleep(policy.interval).await;
    }
    Err(RetryExhausted {
        attempts: policy.attempts,
        last,
    })
}
