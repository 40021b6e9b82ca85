//! Bounded retry with backoff.
//!
//! [`retry`] runs an async operation until it succeeds or the policy's attempt budget is spent,
//! sleeping between attempts according to [`RetryPolicy::backoff_for`].

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times to try an operation, and how long to wait between tries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
    /// Multiplier applied to the delay after each further failure (1.0 keeps it fixed)
    pub backoff_factor: f64,
    /// Upper bound on any single delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            backoff_factor: 1.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `failed_attempt` (1-based) has failed.
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let scaled = self.backoff.as_secs_f64() * self.backoff_factor.max(1.0).powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(scaled)
    }
}

/// Successful result of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// The operation failed on every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `operation` until it succeeds, at most `policy.max_attempts` times.
///
/// The closure receives the 1-based attempt number. No delay follows the final attempt.
/// A policy with `max_attempts == 0` still makes one attempt.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<Retried<T>, Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(Retried { value, attempts: attempt }),
            Err(e) if attempt >= max_attempts => {
                return Err(Exhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.backoff_for(attempt);
                debug!("Attempt {}/{} failed: {}; retrying in {:?}", attempt, max_attempts, e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
