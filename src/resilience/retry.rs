// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with exponential or linear backoff.
//!
//! `max_attempts` counts the first try. The delay before attempt `n`
//! (`n >= 2`) is:
//!
//! - Exponential: `base_delay * 2^(n-2)` → 100ms, 200ms, 400ms, ...
//! - Linear: `base_delay * (n-1)` → 100ms, 200ms, 300ms, ...
//!
//! # Example
//!
//! ```
//! use legacy_gateway::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::query();
//! assert_eq!(policy.max_attempts, 3);
//! assert_eq!(policy.delay_before(2), Duration::from_millis(100));
//! assert_eq!(policy.delay_before(3), Duration::from_millis(200));
//! ```

use serde::Deserialize;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
}

impl FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exponential" => Ok(Self::Exponential),
            "linear" => Ok(Self::Linear),
            other => Err(format!("unknown backoff strategy '{}'", other)),
        }
    }
}

/// Retry configuration for an upstream operation.
///
/// Use the preset constructors for common patterns:
/// - [`RetryPolicy::startup()`] - Connection attempts during `init()`
/// - [`RetryPolicy::query()`] - Individual upstream/cache calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::query()
    }
}

impl RetryPolicy {
    /// Fast-fail retry for initial connections.
    /// 5 attempts, 200ms base, exponential: fails after ~3 seconds.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            backoff: BackoffStrategy::Exponential,
        }
    }

    /// Quick retry for individual queries.
    #[must_use]
    pub fn query() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            backoff: BackoffStrategy::Exponential,
        }
    }

    /// Single attempt, no retry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff: BackoffStrategy::Exponential,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff: BackoffStrategy::Exponential,
        }
    }

    /// Delay to wait before `attempt` (1-indexed). Zero for the first attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        match self.backoff {
            BackoffStrategy::Exponential => {
                // Cap the shift so pathological configs saturate instead of overflowing
                let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt - 1),
        }
    }
}

/// Whether a failure is worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Outcome of a retried operation that did not succeed.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("operation '{operation}' failed after {attempts} attempts in {elapsed:?}: {last}")]
    Exhausted {
        operation: String,
        attempts: u32,
        elapsed: Duration,
        last: E,
    },

    /// A non-retryable error stopped the loop early
    #[error("{0}")]
    Aborted(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Aborted(e) => e,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is reached.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display + Retryable,
{
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(val) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) if !err.is_retryable() => {
                return Err(RetryError::Aborted(err));
            }
            Err(err) => {
                if attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %err,
                        "Operation exhausted retries"
                    );
                    return Err(RetryError::Exhausted {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        elapsed: started.elapsed(),
                        last: err,
                    });
                }

                let delay = policy.delay_before(attempt + 1);
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name, attempt, max_attempts, err, delay
                );
                crate::metrics::record_retry(operation_name);

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
