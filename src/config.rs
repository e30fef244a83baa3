// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the legacy gateway.
//!
//! # Example
//!
//! ```
//! use legacy_gateway::GatewayConfig;
//!
//! // Minimal config (uses defaults)
//! let config = GatewayConfig::default();
//! assert_eq!(config.max_retries, 3);
//! assert_eq!(config.cache_ttl_seconds, 300);
//!
//! // Full config
//! let config = GatewayConfig {
//!     legacy_api_base_url: "http://legacy.internal:8080".into(),
//!     api_timeout_ms: 2_000,
//!     breaker_failure_threshold: 3,
//!     ..Default::default()
//! };
//! assert_eq!(config.api_timeout().as_millis(), 2_000);
//! ```

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::circuit_breaker::{BreakerConfig, BreakerScope};
use crate::resilience::retry::{BackoffStrategy, RetryPolicy};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the gateway.
///
/// All fields have sensible defaults. At minimum, point
/// `legacy_api_base_url` at the upstream for production use.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the legacy REST service (no trailing slash)
    #[serde(default = "default_legacy_api_base_url")]
    pub legacy_api_base_url: String,

    /// Per-attempt upstream timeout
    #[serde(default = "default_api_timeout_ms")]
    pub api_timeout_ms: u64,

    /// Attempts per logical upstream call, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,

    /// Default cache TTL
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// L1 entry cap (0 = unbounded)
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Optional Redis URL for the durable L2 cache tier
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Key prefix for the L2 tier (e.g. "gateway:")
    #[serde(default)]
    pub redis_prefix: Option<String>,

    /// Circuit breaker settings
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_breaker_cooldown_ms")]
    pub breaker_cooldown_ms: u64,
    #[serde(default = "default_breaker_failure_window_ms")]
    pub breaker_failure_window_ms: u64,
    #[serde(default)]
    pub breaker_scope: BreakerScope,

    /// Fixed-window rate limit per caller
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Response contract version stamped on every envelope
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Hide internal error details from callers
    #[serde(default)]
    pub production: bool,
}

fn default_legacy_api_base_url() -> String { "https://jsonplaceholder.typicode.com".to_string() }
fn default_api_timeout_ms() -> u64 { 5_000 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 1_000 }
fn default_cache_ttl_seconds() -> u64 { 300 } // 5 minutes
fn default_cache_max_entries() -> usize { 10_000 }
fn default_breaker_failure_threshold() -> u32 { 5 }
fn default_breaker_cooldown_ms() -> u64 { 30_000 }
fn default_breaker_failure_window_ms() -> u64 { 60_000 }
fn default_rate_limit_window_ms() -> u64 { 15 * 60 * 1_000 } // 15 minutes
fn default_rate_limit_max() -> u32 { 100 }
fn default_api_version() -> String { "v2".to_string() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            legacy_api_base_url: default_legacy_api_base_url(),
            api_timeout_ms: default_api_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_strategy: BackoffStrategy::default(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_entries: default_cache_max_entries(),
            redis_url: None,
            redis_prefix: None,
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_cooldown_ms: default_breaker_cooldown_ms(),
            breaker_failure_window_ms: default_breaker_failure_window_ms(),
            breaker_scope: BreakerScope::default(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            rate_limit_max: default_rate_limit_max(),
            api_version: default_api_version(),
            production: false,
        }
    }
}

impl GatewayConfig {
    /// Build a config from process environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by `from_env`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("LEGACY_API_BASE_URL") {
            config.legacy_api_base_url = url.trim_end_matches('/').to_string();
        }
        parse_into(&lookup, "API_TIMEOUT_MS", &mut config.api_timeout_ms)?;
        parse_into(&lookup, "MAX_RETRIES", &mut config.max_retries)?;
        parse_into(&lookup, "RETRY_DELAY_MS", &mut config.retry_delay_ms)?;
        parse_into(&lookup, "BACKOFF_STRATEGY", &mut config.backoff_strategy)?;
        parse_into(&lookup, "CACHE_TTL_SECONDS", &mut config.cache_ttl_seconds)?;
        parse_into(&lookup, "CACHE_MAX_ENTRIES", &mut config.cache_max_entries)?;
        parse_into(&lookup, "BREAKER_FAILURE_THRESHOLD", &mut config.breaker_failure_threshold)?;
        parse_into(&lookup, "BREAKER_COOLDOWN_MS", &mut config.breaker_cooldown_ms)?;
        parse_into(&lookup, "BREAKER_FAILURE_WINDOW_MS", &mut config.breaker_failure_window_ms)?;
        parse_into(&lookup, "BREAKER_SCOPE", &mut config.breaker_scope)?;
        parse_into(&lookup, "RATE_LIMIT_WINDOW_MS", &mut config.rate_limit_window_ms)?;
        parse_into(&lookup, "RATE_LIMIT_MAX", &mut config.rate_limit_max)?;

        config.redis_url = lookup("REDIS_URL").filter(|s| !s.is_empty());
        config.redis_prefix = lookup("REDIS_PREFIX").filter(|s| !s.is_empty());

        let env = lookup("GATEWAY_ENV").or_else(|| lookup("NODE_ENV"));
        config.production = env.as_deref() == Some("production");

        if config.max_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_RETRIES",
                value: "0".into(),
                reason: "at least one attempt is required".into(),
            });
        }

        Ok(config)
    }

    #[must_use]
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    /// Retry policy applied to every upstream call.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_millis(self.retry_delay_ms),
            backoff: self.backoff_strategy,
        }
    }

    #[must_use]
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            cooldown: Duration::from_millis(self.breaker_cooldown_ms),
            failure_window: Duration::from_millis(self.breaker_failure_window_ms),
        }
    }
}

fn parse_into<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}
