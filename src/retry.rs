//! Bounded exponential backoff for eventual-consistency polling.
//!
//! Most control-plane operations return before the object is usable: a store
//! has to reach `ready`, a dropped relation has to leave the catalog. The
//! helpers here re-run a status check with growing delays until it reports a
//! terminal value or the policy's total time budget runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Backoff settings for a polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second check.
    pub initial_interval: Duration,
    /// Upper bound on a single delay.
    pub max_interval: Duration,
    /// Growth factor between delays.
    pub multiplier: f64,
    /// Total time after which polling gives up.
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    /// Default total wait for an object to settle.
    pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(5 * 60);

    /// Create a policy.
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        multiplier: f64,
        max_elapsed: Duration,
    ) -> Self {
        Self {
            initial_interval,
            max_interval,
            multiplier: multiplier.max(1.0),
            max_elapsed,
        }
    }

    /// Replace the total time budget.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// Delay to sleep after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_interval.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
            2.0,
            Self::DEFAULT_MAX_ELAPSED,
        )
    }
}

/// Outcome of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// The object reached a terminal state.
    Ready(T),
    /// Not there yet; the string says why, for logs and timeout errors.
    Pending(String),
}

/// Re-run `check` until it returns [`PollStatus::Ready`].
///
/// Errors end the loop at once, except [`ProviderError::Unavailable`] which is
/// treated as a pending check. Running past `policy.max_elapsed` yields
/// [`ProviderError::DeadlineExceeded`] carrying the last pending reason.
pub async fn poll_until<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut check: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, ProviderError>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let reason = match check().await {
            Ok(PollStatus::Ready(value)) => {
                debug!(what, attempts = attempt + 1, "poll complete");
                return Ok(value);
            }
            Ok(PollStatus::Pending(reason)) => reason,
            Err(ProviderError::Unavailable(msg)) => {
                warn!(what, error = %msg, "control plane unavailable, retrying");
                msg
            }
            Err(e) => return Err(e),
        };

        attempt += 1;
        let elapsed = started.elapsed();
        if elapsed >= policy.max_elapsed {
            return Err(ProviderError::DeadlineExceeded(format!(
                "gave up waiting for {} after {}s: {}",
                what,
                elapsed.as_secs(),
                reason
            )));
        }

        let delay = policy
            .delay_for_attempt(attempt)
            .min(policy.max_elapsed - elapsed);
        debug!(what, attempt, delay_ms = delay.as_millis() as u64, reason = %reason, "still waiting");
        tokio::time::sleep(delay).await;
    }
}

/// Poll `exists` until it reports the object gone.
pub async fn wait_until_absent<F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut exists: F,
) -> Result<(), ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ProviderError>>,
{
    poll_until(policy, what, || {
        let fut = exists();
        async move {
            Ok(if fut.await? {
                PollStatus::Pending("still present".to_string())
            } else {
                PollStatus::Ready(())
            })
        }
    })
    .await
}
