// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Gateway façade.
//!
//! The [`Gateway`] is the single entry point that ties the components
//! together:
//! - Cache store (L1 memory, optional L2 Redis)
//! - Upstream client (retry, circuit breakers, timeouts)
//! - Transformation pipeline
//! - Response envelopes and the error taxonomy
//!
//! # Request flow
//!
//! ```text
//! key ─▶ cache hit? ──yes────────────────────────────────┐
//!           │ no                                         │
//!           ▼                                            ▼
//!   upstream (breaker + retry) ─▶ transform ─▶ write-through ─▶ filter/paginate ─▶ envelope
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Created → Ready → ShuttingDown → Stopped
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use legacy_gateway::{Gateway, GatewayConfig, GatewayState};
//! use legacy_gateway::gateway::CustomerQuery;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Gateway::from_config(GatewayConfig::default());
//! gateway.init().await?;
//! assert_eq!(gateway.state(), GatewayState::Ready);
//!
//! let page = gateway.list_customers(CustomerQuery::default()).await?;
//! println!("{} of {} customers", page.data.len(), page.pagination.total);
//!
//! gateway.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod api;
pub mod keys;
pub mod pagination;
mod types;

pub use types::{CustomerQuery, GatewayState, HealthReport, PaymentQuery};

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cache::redis::RedisCache;
use crate::cache::{CacheBackend, MemoryCache, TieredCache};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::rate_limit::RateLimiter;
use crate::resource::Resource;
use crate::upstream::{HttpTransport, UpstreamClient, UpstreamTransport};

use keys::ops;

/// Resilient, caching façade over the legacy service.
///
/// Cheap to share: wrap in an `Arc` and call from any task.
pub struct Gateway {
    config: GatewayConfig,
    cache: Arc<TieredCache>,
    upstream: Arc<UpstreamClient>,
    rate_limiter: RateLimiter,
    state: watch::Sender<GatewayState>,
    state_rx: watch::Receiver<GatewayState>,
}

impl Gateway {
    /// Assemble a gateway from injected components.
    pub fn new(config: GatewayConfig, cache: Arc<TieredCache>, upstream: Arc<UpstreamClient>) -> Self {
        let (state, state_rx) = watch::channel(GatewayState::Created);
        let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window());
        crate::metrics::set_gateway_state(GatewayState::Created.as_str());

        Self {
            config,
            cache,
            upstream,
            rate_limiter,
            state,
            state_rx,
        }
    }

    /// Gateway over HTTP with a memory-only cache; `init()` adds Redis when
    /// `redis_url` is set.
    pub fn from_config(config: GatewayConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(&config.legacy_api_base_url));
        Self::with_transport(config, transport)
    }

    /// Gateway over any [`UpstreamTransport`].
    pub fn with_transport(config: GatewayConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        let l1 = Arc::new(MemoryCache::with_capacity(config.cache_max_entries));
        let cache = Arc::new(TieredCache::memory_only(l1, config.cache_ttl()));
        let upstream = Arc::new(UpstreamClient::from_config(&config, transport));
        Self::new(config, cache, upstream)
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    #[must_use]
    pub fn upstream(&self) -> &Arc<UpstreamClient> {
        &self.upstream
    }

    #[must_use]
    pub fn state(&self) -> GatewayState {
        *self.state_rx.borrow()
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<GatewayState> {
        self.state_rx.clone()
    }

    fn set_state(&self, state: GatewayState) {
        let _ = self.state.send(state);
        crate::metrics::set_gateway_state(state.as_str());
    }

    /// Connect the L2 tier (when configured) and mark the gateway ready.
    ///
    /// An unreachable Redis is logged and the gateway runs memory-only.
    #[tracing::instrument(skip(self), fields(has_redis))]
    pub async fn init(&self) -> Result<(), GatewayError> {
        match self.state() {
            GatewayState::Created => {}
            GatewayState::Ready => return Ok(()),
            state => {
                return Err(GatewayError::internal(format!("cannot init gateway in state {}", state)));
            }
        }

        if let Some(ref url) = self.config.redis_url {
            match RedisCache::with_prefix(url, self.config.redis_prefix.as_deref()).await {
                Ok(redis) => {
                    self.cache.attach_l2(Arc::new(redis));
                    tracing::Span::current().record("has_redis", true);
                    info!("L2 cache tier attached");
                }
                Err(e) => {
                    tracing::Span::current().record("has_redis", false);
                    warn!(error = %e, "Redis unavailable, continuing with memory cache only");
                    crate::metrics::record_cache_error("L2", "connect");
                }
            }
        } else {
            tracing::Span::current().record("has_redis", false);
        }

        self.set_state(GatewayState::Ready);
        info!(
            upstream = %self.config.legacy_api_base_url,
            scope = ?self.upstream.breakers().scope(),
            "Gateway ready"
        );
        Ok(())
    }

    /// Clear L1, release the L2 tier and stop serving.
    ///
    /// L2 contents are left in place for the next process.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        if self.state() == GatewayState::Stopped {
            return;
        }
        self.set_state(GatewayState::ShuttingDown);
        info!("Gateway shutting down");

        if let Err(e) = self.cache.l1().clear().await {
            warn!(error = %e, "Failed to clear L1 on shutdown");
        }
        if self.cache.detach_l2().is_some() {
            info!("L2 cache tier released");
        }

        self.set_state(GatewayState::Stopped);
        info!("Gateway stopped");
    }

    /// Remove every gateway entry in every tier.
    ///
    /// Deletes by resource namespace, so an unprefixed shared Redis keeps
    /// keys that other applications wrote.
    #[tracing::instrument(skip(self))]
    pub async fn flush(&self) -> Result<(), GatewayError> {
        let mut removed = 0;
        for resource in Resource::ALL {
            removed += self.cache.delete_prefix(&format!("{}:", resource.as_str())).await?;
        }
        info!(removed, "Cache flushed");
        Ok(())
    }

    /// Drop cached entries derived from `resource`.
    ///
    /// Enriched customers embed payments, so invalidating payments also
    /// drops them.
    #[tracing::instrument(skip(self), fields(resource = %resource))]
    pub async fn invalidate(&self, resource: Resource) -> Result<usize, GatewayError> {
        let prefix = format!("{}:", resource.as_str());
        let mut removed = self.cache.delete_prefix(&prefix).await?;
        if resource == Resource::Payments {
            removed += self.cache.delete_prefix(ops::CUSTOMERS_ENRICHED).await?;
        }
        info!(removed, "Cache invalidated");
        Ok(removed)
    }

    /// Count a request from `caller` against the fixed-window limit.
    pub fn check_rate_limit(&self, caller: &str) -> Result<(), GatewayError> {
        self.rate_limiter.check(caller).map_err(|retry_after| {
            crate::metrics::record_rate_limited();
            warn!(caller, ?retry_after, "Rate limit exceeded");
            GatewayError::RateLimited { retry_after }
        })
    }

    /// Point-in-time health of breakers, cache and lifecycle.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let state = self.state();
        let breakers = self.upstream.breaker_snapshots();
        let l1_entries = self.cache.l1().len();
        crate::metrics::set_cache_entries(l1_entries);

        let healthy = state != GatewayState::Stopped && breakers.iter().all(|b| b.state != CircuitState::Open);
        HealthReport {
            state,
            healthy,
            breakers,
            l1_entries,
            l2_attached: self.cache.has_l2(),
            rate_limited_callers: self.rate_limiter.tracked_callers(),
        }
    }

    fn ensure_serving(&self) -> Result<(), GatewayError> {
        match self.state() {
            GatewayState::ShuttingDown | GatewayState::Stopped => Err(GatewayError::ServiceUnavailable {
                reason: "gateway is shutting down".to_string(),
                retry_after: self.config.breaker_config().cooldown,
            }),
            _ => Ok(()),
        }
    }
}
