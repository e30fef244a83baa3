//! Integration Tests for the Redis L2 tier
//!
//! These tests need a real Redis. They use testcontainers for portability,
//! so no external docker-compose is required.
//!
//! # Running Tests
//! ```bash
//! # Run all integration tests (requires Docker)
//! cargo test --test integration -- --ignored
//!
//! # Run only happy-path tests
//! cargo test --test integration happy -- --ignored
//!
//! # Run only failure scenario tests
//! cargo test --test integration failure -- --ignored
//! ```
//!
//! # Test Organization
//! - `happy_*` - Normal operation: TTL, prefixes, gateway read-through
//! - `failure_*` - Failure scenarios: Redis death, corrupted entries

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use legacy_gateway::cache::redis::RedisCache;
use legacy_gateway::gateway::CustomerQuery;
use legacy_gateway::transform::fixtures;
use legacy_gateway::{CacheBackend, Gateway, GatewayConfig, GatewayState, UpstreamError, UpstreamTransport};

use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

// =============================================================================
// Container Helpers
// =============================================================================

/// Create a Redis container with health check
fn redis_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));
    docker.run(image)
}

fn redis_url(container: &Container<'_, GenericImage>) -> String {
    format!("redis://127.0.0.1:{}", container.get_host_port_ipv4(6379))
}

/// Upstream that serves fixture users and counts calls
struct CountingUsers {
    calls: AtomicU32,
}

#[async_trait]
impl UpstreamTransport for CountingUsers {
    async fn get_json(&self, _path: &str) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::to_value(fixtures::legacy_users(12)).expect("fixtures serialize"))
    }
}

// =============================================================================
// Happy Path Tests - Normal Operation
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_redis_set_get_and_expire() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let cache = RedisCache::with_prefix(&redis_url(&redis), Some("test:"))
        .await
        .expect("connect");

    assert!(cache.set("k", json!({"a": 1}), Duration::from_millis(300)).await.unwrap());
    assert_eq!(cache.get("k").await.unwrap(), Some(json!({"a": 1})));
    assert!(cache.has("k").await.unwrap());
    assert!(cache.ttl("k").await.unwrap().unwrap() <= Duration::from_millis(300));

    // Real clock: Redis owns the expiry
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(!cache.has("k").await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_prefix_isolation() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let url = redis_url(&redis);
    let a = RedisCache::with_prefix(&url, Some("a:")).await.unwrap();
    let b = RedisCache::with_prefix(&url, Some("b:")).await.unwrap();

    let ttl = Duration::from_secs(60);
    a.set("customers:list", json!([1]), ttl).await.unwrap();
    a.set("customers:get:id=1", json!(1), ttl).await.unwrap();
    a.set("payments:list", json!([2]), ttl).await.unwrap();
    b.set("customers:list", json!([3]), ttl).await.unwrap();

    assert_eq!(a.delete_prefix("customers:").await.unwrap(), 2);
    assert!(a.has("payments:list").await.unwrap());

    // clear() only touches its own namespace
    a.clear().await.unwrap();
    assert!(!a.has("payments:list").await.unwrap());
    assert_eq!(b.get("customers:list").await.unwrap(), Some(json!([3])));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_l2_survives_gateway_restart() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = GatewayConfig {
        redis_url: Some(redis_url(&redis)),
        redis_prefix: Some("gw:".into()),
        ..Default::default()
    };
    let upstream = Arc::new(CountingUsers { calls: AtomicU32::new(0) });

    let first = Gateway::with_transport(config.clone(), upstream.clone());
    first.init().await.unwrap();
    assert!(first.health().l2_attached);
    let cold = first.list_customers(CustomerQuery::default()).await.unwrap();
    assert!(!cold.metadata.cached);
    first.shutdown().await;
    assert_eq!(first.state(), GatewayState::Stopped);

    // New process: empty L1, warm L2
    let second = Gateway::with_transport(config, upstream.clone());
    second.init().await.unwrap();
    let warm = second.list_customers(CustomerQuery::default()).await.unwrap();
    assert!(warm.metadata.cached);
    assert_eq!(warm.pagination.total, 12);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);

    // L2 hit back-filled L1
    assert!(second.cache().l1().has("customers:list").await.unwrap());
    second.shutdown().await;
}

// =============================================================================
// Failure Scenario Tests
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_redis_killed_requests_still_succeed() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let config = GatewayConfig {
        redis_url: Some(redis_url(&redis)),
        ..Default::default()
    };
    let upstream = Arc::new(CountingUsers { calls: AtomicU32::new(0) });
    let gw = Gateway::with_transport(config, upstream.clone());
    gw.init().await.unwrap();

    redis.stop();

    // L2 errors are logged and downgraded; L1 carries the request
    let cold = gw.list_customers(CustomerQuery::default()).await.unwrap();
    assert!(!cold.metadata.cached);
    let warm = gw.list_customers(CustomerQuery::default()).await.unwrap();
    assert!(warm.metadata.cached);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_unreachable_redis_falls_back_to_memory() {
    let config = GatewayConfig {
        // Nothing listens here
        redis_url: Some("redis://127.0.0.1:1".into()),
        ..Default::default()
    };
    let upstream = Arc::new(CountingUsers { calls: AtomicU32::new(0) });
    let gw = Gateway::with_transport(config, upstream);

    gw.init().await.unwrap();
    assert_eq!(gw.state(), GatewayState::Ready);
    assert!(!gw.health().l2_attached);
    assert!(gw.list_customers(CustomerQuery::default()).await.is_ok());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn failure_corrupted_entry_is_a_miss() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let url = redis_url(&redis);

    // Write garbage under the gateway's key, bypassing the cache API
    let client = redis::Client::open(url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("SET")
        .arg("customers:list")
        .arg("{not json")
        .query_async(&mut conn)
        .await
        .unwrap();

    let upstream = Arc::new(CountingUsers { calls: AtomicU32::new(0) });
    let gw = Gateway::with_transport(
        GatewayConfig {
            redis_url: Some(url),
            ..Default::default()
        },
        upstream.clone(),
    );
    gw.init().await.unwrap();

    let env = gw.list_customers(CustomerQuery::default()).await.unwrap();
    assert!(!env.metadata.cached);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn happy_flush_spares_foreign_keys() {
    let docker = Cli::default();
    let redis = redis_container(&docker);
    let url = redis_url(&redis);

    let client = redis::Client::open(url.as_str()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("SET")
        .arg("session:abc")
        .arg("other-app")
        .query_async(&mut conn)
        .await
        .unwrap();

    // No REDIS_PREFIX: the gateway shares the keyspace
    let upstream = Arc::new(CountingUsers { calls: AtomicU32::new(0) });
    let gw = Gateway::with_transport(
        GatewayConfig {
            redis_url: Some(url.clone()),
            ..Default::default()
        },
        upstream.clone(),
    );
    gw.init().await.unwrap();
    gw.list_customers(CustomerQuery::default()).await.unwrap();

    let before: bool = redis::cmd("EXISTS")
        .arg("customers:list")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(before);

    gw.flush().await.unwrap();

    let gateway_key: bool = redis::cmd("EXISTS")
        .arg("customers:list")
        .query_async(&mut conn)
        .await
        .unwrap();
    let foreign: Option<String> = redis::cmd("GET")
        .arg("session:abc")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert!(!gateway_key, "gateway entries are flushed");
    assert_eq!(foreign.as_deref(), Some("other-app"));

    // The raw cache refuses a whole-keyspace delete when unprefixed
    let raw = RedisCache::new(&url).await.unwrap();
    assert!(raw.clear().await.is_err());
    let foreign: Option<String> = redis::cmd("GET")
        .arg("session:abc")
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(foreign.as_deref(), Some("other-app"));
}
