//! Retry with exponential backoff and jitter.
//!
//! [`with_retry`] wraps a fallible async operation in a [`RetryPolicy`]:
//! on failure it sleeps `min(initial_delay * exponential_base^attempt,
//! max_delay)` (scaled by a uniform factor in `[0.5, 1.0)` when jitter is
//! enabled) and tries again. The last attempt's error is returned
//! unchanged.

use std::time::Duration;

use derive_builder::Builder;
use rand::Rng;

use crate::TRACING_TARGET;

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(
    name = "RetryPolicyBuilder",
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    #[builder(default = "3")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[builder(default = "Duration::from_secs(1)")]
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    #[builder(default = "Duration::from_secs(60)")]
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    #[builder(default = "2.0")]
    pub exponential_base: f64,
    /// Whether to randomize delays.
    #[builder(default = "true")]
    pub jitter: bool,
}

impl RetryPolicyBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(attempts) = self.max_attempts {
            if attempts == 0 {
                return Err("max_attempts must be at least 1".into());
            }
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Returns a builder for creating a policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Returns the backoff delay after the given zero-based attempt.
    fn delay_after(&self, attempt: u32) -> Duration {
        let exponential =
            self.initial_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_secs_f64());
        let scaled = if self.jitter {
            capped * rand::rng().random_range(0.5..1.0)
        } else {
            capped
        };
        Duration::from_secs_f64(scaled)
    }
}

/// Calls `op` until it succeeds or the policy's attempts are exhausted.
///
/// Works uniformly for I/O-bound and compute-bound operations; the only
/// suspension points are the backoff sleeps. After the final failure the
/// original error is returned without wrapping.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    target: TRACING_TARGET,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "All attempts failed"
                );
                return Err(err);
            }
        }
    }
}
