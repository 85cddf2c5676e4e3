//! Bounded retry with jittered exponential backoff.
//!
//! A retry sequence is local to one call of
//! [`RetryExecutor::execute_with_retry`]: the attempt counter, the last
//! error and the backoff sleeps belong to that future alone, so any number
//! of sequences can be in flight on the same executor.

use crate::error::{OperationError, OperationFailure};
use rand::Rng;
use shared::config::RetrySettings;
use shared::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{Instrument, debug, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_ratio: f64,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
    pub const DEFAULT_JITTER_RATIO: f64 = 0.1;

    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_ratio: f64,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if base_delay > max_delay {
            return Err(Error::InvalidConfig(format!(
                "retry base delay {base_delay:?} exceeds max delay {max_delay:?}"
            )));
        }
        if !(0.0..=1.0).contains(&jitter_ratio) {
            return Err(Error::InvalidConfig(format!(
                "retry jitter ratio {jitter_ratio} must be within 0.0..=1.0"
            )));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter_ratio,
        })
    }

    pub fn from_settings(settings: &RetrySettings) -> Result<Self> {
        Self::new(
            settings.max_attempts,
            settings.base_delay.as_duration(),
            settings.max_delay.as_duration(),
            settings.jitter_ratio,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// `base * 2^(attempt-1)` plus `jitter_sample * jitter_ratio` of that,
    /// capped at the max delay. `attempt` is 1-based and `jitter_sample`
    /// is expected in `0.0..1.0`.
    pub fn backoff_delay(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let exponential_ms = base_ms.saturating_mul(factor);
        let jitter_ms = (exponential_ms as f64 * self.jitter_ratio * jitter_sample.clamp(0.0, 1.0)) as u64;
        Duration::from_millis(exponential_ms.saturating_add(jitter_ms)).min(self.max_delay)
    }

    /// Delay before the attempt following `attempt`. A server-provided
    /// retry-after hint is used verbatim.
    pub fn delay_for(&self, attempt: u32, error: &OperationError) -> Duration {
        match error.retry_after() {
            Some(hint) => hint,
            None => self.backoff_delay(attempt, rand::rng().random::<f64>()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            jitter_ratio: Self::DEFAULT_JITTER_RATIO,
        }
    }
}

/// State of one retry sequence.
#[derive(Debug, Default)]
pub struct RetryContext {
    /// 1-based once the first attempt starts.
    pub attempt: u32,
    pub last_error: Option<OperationError>,
}

impl RetryContext {
    fn begin_attempt(&mut self) {
        self.attempt += 1;
    }

    fn fail(self, error: OperationError) -> OperationFailure {
        OperationFailure::from_error(error, self.attempt)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds, fails terminally, or the attempt
    /// cap is reached. Expected failures come back as
    /// [`OperationFailure`] values; `context` labels the tracing span.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        context: &str,
        mut operation: F,
    ) -> std::result::Result<T, OperationFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, OperationError>>,
    {
        let span = tracing::debug_span!("retry", context = %context);
        async move {
            let mut ctx = RetryContext::default();
            loop {
                ctx.begin_attempt();
                let error = match operation().await {
                    Ok(value) => {
                        if ctx.attempt > 1 {
                            debug!(attempt = ctx.attempt, "operation succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(error) => error,
                };

                if !error.is_retryable() {
                    warn!(attempt = ctx.attempt, error = %error, "operation rejected, not retrying");
                    return Err(ctx.fail(error));
                }

                if ctx.attempt >= self.policy.max_attempts {
                    warn!(attempts = ctx.attempt, error = %error, "giving up after max attempts");
                    return Err(ctx.fail(error));
                }

                let delay = self.policy.delay_for(ctx.attempt, &error);
                warn!(
                    attempt = ctx.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, retrying"
                );
                ctx.last_error = Some(error);
                tokio::time::sleep(delay).await;
            }
        }
        .instrument(span)
        .await
    }
}
