//! Exponential backoff for transient inference failures.

use std::future::Future;
use std::time::Duration;

use bon::Builder;

use crate::error::StepwiseError;

/// How often, and how patiently, to retry an operation that failed with a
/// retryable error (see [`StepwiseError::is_retryable`]).
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    #[builder(default = 3)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_millis(500))]
    pub initial_backoff: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub max_backoff: Duration,
    #[builder(default = 2.0)]
    pub multiplier: f64,
    /// Spread each delay over 75%..125% of its nominal value.
    #[builder(default = true)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::builder().max_attempts(1).build()
    }

    /// Nominal delay before retry number `retry` (0-based), capped at
    /// `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let secs = (self.initial_backoff.as_secs_f64() * factor).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out.
    pub async fn run<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, StepwiseError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepwiseError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && retry + 1 < attempts => {
                    let delay = self.jittered(self.backoff_for(retry));
                    retry += 1;
                    tracing::warn!(
                        operation = label,
                        attempt = retry,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let unit = (uuid::Uuid::new_v4().as_u128() % 10_000) as f64 / 10_000.0;
        delay.mul_f64(0.75 + unit * 0.5)
    }
}
