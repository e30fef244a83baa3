//! Chaos Testing for the Gateway
//!
//! This module tests failure scenarios using:
//! 1. **FailingBackend wrappers** - precise L2 error injection at specific call counts
//! 2. **Flaky upstreams** - intermittent server errors the retry loop must absorb
//! 3. **Outages under load** - many concurrent callers while the upstream flips
//!
//! No Docker is needed: the L2 tier is a `MemoryCache` behind an
//! injecting wrapper. See `integration.rs` for a real Redis.
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use legacy_gateway::cache::TieredCache;
use legacy_gateway::gateway::{CustomerQuery, PaymentQuery};
use legacy_gateway::transform::fixtures;
use legacy_gateway::{
    BackoffStrategy, CacheBackend, CacheError, CircuitState, Gateway, GatewayConfig, MemoryCache, Resource,
    UpstreamClient, UpstreamError, UpstreamTransport,
};

// =============================================================================
// Failing Backend Wrapper - Precise Error Injection
// =============================================================================

/// Wraps a backend and fails on the listed call numbers (1-indexed), or on
/// every call once `fail_permanently` is set.
struct FailingBackend<B: CacheBackend> {
    inner: B,
    call_count: AtomicU64,
    fail_on_calls: Vec<u64>,
    fail_permanently: AtomicBool,
}

impl<B: CacheBackend> FailingBackend<B> {
    fn new(inner: B, fail_on_calls: Vec<u64>) -> Self {
        Self {
            inner,
            call_count: AtomicU64::new(0),
            fail_on_calls,
            fail_permanently: AtomicBool::new(false),
        }
    }

    fn always_failing(inner: B) -> Self {
        let backend = Self::new(inner, vec![]);
        backend.fail_permanently.store(true, Ordering::SeqCst);
        backend
    }

    fn check(&self) -> Result<(), CacheError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_permanently.load(Ordering::SeqCst) || self.fail_on_calls.contains(&n) {
            return Err(CacheError::Backend(format!("injected failure on call {}", n)));
        }
        Ok(())
    }

    fn calls(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<B: CacheBackend> CacheBackend for FailingBackend<B> {
    fn tier(&self) -> &'static str {
        "L2"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        self.check()?;
        self.inner.delete_prefix(prefix).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.check()?;
        self.inner.clear().await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        self.check()?;
        self.inner.ttl(key).await
    }
}

// =============================================================================
// Flaky Upstream
// =============================================================================

/// Serves fixtures, but answers 502 on every `fail_every`-th call, and 503
/// on every call while `down` is set.
struct FlakyLegacy {
    calls: AtomicU64,
    fail_every: u64,
    down: AtomicBool,
}

impl FlakyLegacy {
    fn new(fail_every: u64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU64::new(0),
            fail_every,
            down: AtomicBool::new(false),
        })
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamTransport for FlakyLegacy {
    async fn get_json(&self, path: &str) -> Result<Value, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failure = |status| UpstreamError::Status {
            path: path.to_string(),
            status,
            body: String::new(),
        };
        if self.down.load(Ordering::SeqCst) {
            return Err(failure(503));
        }
        if self.fail_every > 0 && n % self.fail_every == 0 {
            return Err(failure(502));
        }

        let body = if path.starts_with("/users") {
            serde_json::to_value(fixtures::legacy_users(10))
        } else {
            serde_json::to_value(fixtures::legacy_posts(10, 3))
        };
        Ok(body.expect("fixtures serialize"))
    }
}

fn config() -> GatewayConfig {
    GatewayConfig {
        api_timeout_ms: 1_000,
        max_retries: 3,
        retry_delay_ms: 50,
        backoff_strategy: BackoffStrategy::Exponential,
        breaker_failure_threshold: 3,
        breaker_cooldown_ms: 10_000,
        cache_ttl_seconds: 300,
        ..Default::default()
    }
}

fn gateway_with_l2(l2: Arc<dyn CacheBackend>, transport: Arc<dyn UpstreamTransport>) -> Gateway {
    let config = config();
    let l1 = Arc::new(MemoryCache::new());
    let cache = Arc::new(TieredCache::with_l2(l1, l2, config.cache_ttl()));
    let upstream = Arc::new(UpstreamClient::from_config(&config, transport));
    Gateway::new(config, cache, upstream)
}

// =============================================================================
// L2 Chaos
// =============================================================================

#[tokio::test(start_paused = true)]
async fn chaos_dead_l2_never_fails_a_request() {
    let l2 = Arc::new(FailingBackend::always_failing(MemoryCache::new()));
    let upstream = FlakyLegacy::new(0);
    let gw = gateway_with_l2(l2.clone(), upstream.clone());
    gw.init().await.unwrap();

    let cold = gw.list_customers(CustomerQuery::default()).await.unwrap();
    assert!(!cold.metadata.cached);
    let warm = gw.list_customers(CustomerQuery::default()).await.unwrap();
    assert!(warm.metadata.cached, "L1 carries the load when L2 is dead");

    assert_eq!(upstream.calls(), 1);
    assert!(l2.calls() >= 2, "L2 was consulted and failed");
    assert_eq!(gw.invalidate(Resource::Customers).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn chaos_intermittent_l2_errors_are_misses() {
    // First get and first set fail; later calls succeed
    let l2 = Arc::new(FailingBackend::new(MemoryCache::new(), vec![1, 2]));
    let upstream = FlakyLegacy::new(0);
    let gw = gateway_with_l2(l2.clone(), upstream.clone());
    gw.init().await.unwrap();

    gw.list_payments(PaymentQuery::default()).await.unwrap();
    assert_eq!(upstream.calls(), 1);

    // Drop L1; the failed write-through means L2 is empty too
    gw.cache().l1().clear().await.unwrap();
    let again = gw.list_payments(PaymentQuery::default()).await.unwrap();
    assert!(!again.metadata.cached);
    assert_eq!(upstream.calls(), 2);

    // This write-through landed, so L2 now serves after an L1 wipe
    gw.cache().l1().clear().await.unwrap();
    let from_l2 = gw.list_payments(PaymentQuery::default()).await.unwrap();
    assert!(from_l2.metadata.cached);
    assert_eq!(upstream.calls(), 2);
}

// =============================================================================
// Upstream Chaos
// =============================================================================

#[tokio::test(start_paused = true)]
async fn chaos_intermittent_upstream_errors_are_retried_away() {
    // Every third call fails; a 3-attempt budget always recovers
    let upstream = FlakyLegacy::new(3);
    let gw = Gateway::with_transport(config(), upstream.clone());
    gw.init().await.unwrap();

    for _ in 0..10 {
        let page = gw
            .list_customers(CustomerQuery {
                use_cache: false,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total, 10);
    }

    let health = gw.health();
    assert!(health.healthy);
    assert!(health.degraded_circuits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn chaos_outage_under_load_then_recovery() {
    let upstream = FlakyLegacy::new(0);
    let gw = Arc::new(Gateway::with_transport(config(), upstream.clone()));
    gw.init().await.unwrap();

    upstream.down.store(true, Ordering::SeqCst);
    let mut handles = Vec::new();
    for _ in 0..16 {
        let gw = gw.clone();
        handles.push(tokio::spawn(async move {
            gw.list_payments(PaymentQuery {
                use_cache: false,
                ..Default::default()
            })
            .await
        }));
    }
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.status_code(), 503);
    }

    let breakers = gw.upstream().breaker_snapshots();
    let payments = breakers
        .iter()
        .find(|b| b.name == Resource::Payments.as_str())
        .expect("payments breaker exists");
    assert_eq!(payments.state, CircuitState::Open);
    // Open circuits short-circuit; the upstream saw far fewer than 16 * 3 calls
    assert!(upstream.calls() < 16 * 3);

    upstream.down.store(false, Ordering::SeqCst);
    tokio::time::advance(Duration::from_millis(10_001)).await;

    let page = gw.list_payments(PaymentQuery::default()).await.unwrap();
    assert_eq!(page.pagination.total, 30);
    assert!(gw.health().healthy);
}
