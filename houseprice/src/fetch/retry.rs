//! Retry utilities with configurable backoff and jitter strategies.
//!
//! `with_retry` runs an attempt closure against a strictly decrementing
//! budget. Exhaustion is a value (`RetryOutcome::Exhausted`), not an error.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::protocols::FetchOutcome;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base (constant)
    #[default]
    Constant,
}

/// Jitter strategy to spread out retries from concurrent pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first one.
    pub max_attempts: usize,
    /// Base delay between attempts in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
    /// HTTP statuses that abort without retrying.
    pub fatal_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_strategy: BackoffStrategy::Constant,
            jitter_strategy: JitterStrategy::None,
            fatal_status_codes: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Marks an HTTP status as non-retryable.
    #[must_use]
    pub fn with_fatal_status(mut self, status: u16) -> Self {
        self.fatal_status_codes.push(status);
        self
    }

    /// Whether a status aborts retrying.
    #[must_use]
    pub fn is_fatal_status(&self, status: u16) -> bool {
        self.fatal_status_codes.contains(&status)
    }

    /// Budget actually used; zero is treated as a single attempt.
    #[must_use]
    pub fn attempt_budget(&self) -> usize {
        self.max_attempts.max(1)
    }

    /// Delay after the given failed attempt (0-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;

        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => {
                let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
                base.saturating_mul(2u64.saturating_pow(exponent)).min(max)
            }
            BackoffStrategy::Linear => base
                .saturating_mul(u64::try_from(attempt + 1).unwrap_or(u64::MAX))
                .min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match self.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Final result of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// An attempt succeeded.
    Completed {
        /// The produced value.
        value: T,
        /// Attempts used, including the successful one.
        attempts: usize,
    },
    /// Every attempt failed transiently.
    Exhausted {
        /// Attempts used.
        attempts: usize,
        /// Reason given by the last attempt.
        last_error: String,
    },
    /// An attempt failed fatally; no further attempts were made.
    Aborted {
        /// Attempts used.
        attempts: usize,
        /// Reason given by the fatal attempt.
        reason: String,
    },
}

impl<T> RetryOutcome<T> {
    /// Number of attempts made.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        match self {
            Self::Completed { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }

    /// The value, or `None` when the operation never succeeded.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Completed { value, .. } => Some(value),
            Self::Exhausted { .. } | Self::Aborted { .. } => None,
        }
    }

    /// Failure reason for unsuccessful outcomes.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Exhausted { last_error, .. } => Some(last_error),
            Self::Aborted { reason, .. } => Some(reason),
        }
    }
}

/// Executes an operation with retry logic.
///
/// `operation` receives the 1-indexed attempt number. Transient failures
/// are retried after `policy.delay_for_attempt`; fatal failures stop at once.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> RetryOutcome<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = FetchOutcome<T>>,
{
    let budget = policy.attempt_budget();
    let mut remaining = budget;
    let mut attempt = 0;
    let mut last_error = String::new();

    while remaining > 0 {
        remaining -= 1;
        attempt += 1;

        match operation(attempt).await {
            FetchOutcome::Success(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "Succeeded after retry");
                }
                return RetryOutcome::Completed {
                    value,
                    attempts: attempt,
                };
            }
            FetchOutcome::FatalFailure(reason) => {
                warn!(label, attempt, reason = %reason, "Non-retryable failure");
                return RetryOutcome::Aborted {
                    attempts: attempt,
                    reason,
                };
            }
            FetchOutcome::TransientFailure(reason) => {
                warn!(
                    label,
                    attempt,
                    max_attempts = budget,
                    reason = %reason,
                    "Attempt failed"
                );
                last_error = reason;

                if remaining > 0 {
                    let delay = policy.delay_for_attempt(attempt - 1);
                    debug!(label, delay_ms = delay.as_millis() as u64, "Retrying after delay");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    warn!(label, attempts = attempt, last_error = %last_error, "Retries exhausted");
    RetryOutcome::Exhausted {
        attempts: attempt,
        last_error,
    }
}
