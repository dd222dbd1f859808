//! Bounded retry with exponential backoff and jitter.

use core::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::ConsumerConfig;

/// How often and how patiently to retry a transient failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Cap on any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
    /// Spread each delay by up to 20% either way.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            multiplier: 2,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Build the consumer's policy from configuration.
    pub const fn from_config(config: &ConsumerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: 2,
            jitter: true,
        }
    }

    /// Un-jittered delay before retry number `attempt` (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let growth = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(growth)
            .min(self.max_backoff)
    }

    /// Delay before retry number `attempt`, jittered if enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter {
            return base;
        }
        let millis = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let spread = millis.checked_div(5).unwrap_or(0);
        let offset = rand::rng().random_range(0..=spread.saturating_mul(2));
        Duration::from_millis(millis.saturating_sub(spread).saturating_add(offset))
    }
}

/// Outcome of a failed [`with_retry`] call.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Total attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last: E,
    },

    /// An attempt failed with an error that retrying cannot fix.
    #[error("{0}")]
    Permanent(E),
}

/// Run `op` until it succeeds, fails permanently, or the policy is exhausted.
///
/// `is_transient` classifies each error; permanent errors return at once.
///
/// # Errors
///
/// Returns [`RetryError::Permanent`] for the first non-transient error, or
/// [`RetryError::Exhausted`] after `max_retries` retries.
pub async fn with_retry<F, Fut, T, E, C>(
    policy: &RetryPolicy,
    is_transient: C,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    C: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if !is_transient(&error) => return Err(RetryError::Permanent(error)),
            Err(error) => {
                attempt = attempt.saturating_add(1);
                if attempt > policy.max_retries {
                    warn!(attempts = attempt, error = %error, "retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
                let delay = policy.delay(attempt);
                warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
