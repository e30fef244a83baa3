// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilient client for the legacy service.
//!
//! Every logical call runs one retry loop. Each attempt inside it:
//!
//! ```text
//! breaker.try_acquire() ──rejected──▶ CircuitOpen (loop ends, no sleep)
//!        │ permit
//!        ▼
//! timeout(api_timeout, transport.get_json(path))
//!        │
//!        ├─ Ok(json)       → decode → permit.success()
//!        ├─ transient err  → permit.failure() → retry loop decides
//!        └─ 404 / 4xx      → permit.success() → returned as-is, no retry
//! ```

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::UpstreamError;
use super::transport::UpstreamTransport;
use crate::config::GatewayConfig;
use crate::resilience::circuit_breaker::{BreakerRegistry, BreakerSnapshot, TripsBreaker};
use crate::resilience::retry::{retry, RetryError, RetryPolicy};
use crate::resource::Resource;
use crate::transform::legacy::{LegacyPost, LegacyUser};

pub struct UpstreamClient {
    transport: Arc<dyn UpstreamTransport>,
    breakers: BreakerRegistry,
    policy: RetryPolicy,
    timeout: Duration,
}

impl UpstreamClient {
    #[must_use]
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        breakers: BreakerRegistry,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            breakers,
            policy,
            timeout,
        }
    }

    /// Client wired from [`GatewayConfig`] around any transport.
    #[must_use]
    pub fn from_config(config: &GatewayConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self::new(
            transport,
            BreakerRegistry::new(config.breaker_config(), config.breaker_scope),
            config.retry_policy(),
            config.api_timeout(),
        )
    }

    #[must_use]
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    #[must_use]
    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `path` as `T` under the retry policy and `resource`'s breaker.
    pub async fn request<T>(&self, resource: Resource, operation: &str, path: &str) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
    {
        let result = retry(operation, &self.policy, move |attempt| async move {
            debug!(%resource, path, attempt, "Upstream attempt");
            self.attempt::<T>(resource, path).await
        })
        .await;

        match result {
            Ok(value) => Ok(value),
            Err(RetryError::Aborted(e)) => Err(e),
            Err(RetryError::Exhausted {
                attempts,
                elapsed,
                last,
                ..
            }) => Err(UpstreamError::Exhausted {
                attempts,
                elapsed,
                last: Box::new(last),
            }),
        }
    }

    async fn attempt<T>(&self, resource: Resource, path: &str) -> Result<T, UpstreamError>
    where
        T: DeserializeOwned,
    {
        let breaker = self.breakers.for_resource(resource);
        let permit = breaker.try_acquire()?;
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.transport.get_json(path)).await {
            Ok(Ok(body)) => serde_json::from_value::<T>(body).map_err(|e| UpstreamError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(UpstreamError::Timeout {
                path: path.to_string(),
                after: self.timeout,
            }),
        };
        crate::metrics::record_upstream_latency(resource.as_str(), started.elapsed());

        match &outcome {
            Ok(_) => {
                permit.success();
                crate::metrics::record_upstream_attempt(resource.as_str(), "success");
            }
            Err(e) => {
                if e.trips_breaker() {
                    warn!(%resource, path, error = %e, "Upstream attempt failed");
                    permit.failure();
                } else {
                    // Definitive answer from a healthy upstream
                    permit.success();
                }
                crate::metrics::record_upstream_attempt(resource.as_str(), e.kind());
            }
        }
        outcome
    }

    pub async fn fetch_users(&self) -> Result<Vec<LegacyUser>, UpstreamError> {
        self.request(Resource::Customers, "fetch_users", "/users").await
    }

    pub async fn fetch_user(&self, id: u64) -> Result<LegacyUser, UpstreamError> {
        self.request(Resource::Customers, "fetch_user", &format!("/users/{}", id))
            .await
    }

    pub async fn fetch_posts(&self) -> Result<Vec<LegacyPost>, UpstreamError> {
        self.request(Resource::Payments, "fetch_posts", "/posts").await
    }

    pub async fn fetch_post(&self, id: u64) -> Result<LegacyPost, UpstreamError> {
        self.request(Resource::Payments, "fetch_post", &format!("/posts/{}", id))
            .await
    }

    pub async fn fetch_posts_for_user(&self, user_id: u64) -> Result<Vec<LegacyPost>, UpstreamError> {
        self.request(
            Resource::Payments,
            "fetch_posts_for_user",
            &format!("/posts?userId={}", user_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::{BreakerConfig, BreakerScope, CircuitState};
    use crate::resilience::retry::BackoffStrategy;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Plays back scripted responses, then repeats the fallback.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<Value, UpstreamError>>>,
        fallback: Result<Value, UpstreamError>,
        delay: Duration,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(fallback: Result<Value, UpstreamError>) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback,
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }

        fn then(self, step: Result<Value, UpstreamError>) -> Self {
            self.script.lock().push_back(step);
            self
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamTransport for ScriptedTransport {
        async fn get_json(&self, _path: &str) -> Result<Value, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn server_error() -> Result<Value, UpstreamError> {
        Err(UpstreamError::Status {
            path: "/users".into(),
            status: 503,
            body: "busy".into(),
        })
    }

    fn user_json(id: u64) -> Value {
        json!({"id": id, "name": "N", "username": "u", "email": "e@x.io"})
    }

    fn client(transport: Arc<ScriptedTransport>, threshold: u32) -> UpstreamClient {
        UpstreamClient::new(
            transport,
            BreakerRegistry::new(
                BreakerConfig {
                    failure_threshold: threshold,
                    cooldown: Duration::from_secs(30),
                    failure_window: Duration::from_secs(60),
                },
                BreakerScope::PerResource,
            ),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(100),
                backoff: BackoffStrategy::Exponential,
            },
            Duration::from_secs(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let transport = Arc::new(
            ScriptedTransport::new(Ok(user_json(1)))
                .then(server_error())
                .then(server_error()),
        );
        let c = client(transport.clone(), 10);

        let user = c.fetch_user(1).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(transport.calls(), 3);
        assert_eq!(c.breakers().for_resource(Resource::Customers).failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_attempts() {
        let transport = Arc::new(ScriptedTransport::new(server_error()));
        let c = client(transport.clone(), 10);

        let started = Instant::now();
        let err = c.fetch_users().await.unwrap_err();
        match err {
            UpstreamError::Exhausted { attempts, elapsed, ref last } => {
                assert_eq!(attempts, 3);
                assert_eq!(elapsed, Duration::from_millis(300));
                assert_eq!(last.kind(), "server_error");
            }
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert_eq!(started.elapsed(), Duration::from_millis(300));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_is_not_retried_or_counted() {
        let transport = Arc::new(ScriptedTransport::new(Err(UpstreamError::NotFound {
            path: "/users/42".into(),
        })));
        let c = client(transport.clone(), 1);

        let err = c.fetch_user(42).await.unwrap_err();
        assert!(matches!(err, UpstreamError::NotFound { .. }));
        assert_eq!(transport.calls(), 1);
        assert_eq!(c.breakers().for_resource(Resource::Customers).state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let transport = Arc::new(ScriptedTransport::new(Ok(user_json(1))).slow(Duration::from_secs(5)));
        let c = client(transport.clone(), 10);

        let err = c.fetch_user(1).await.unwrap_err();
        assert_eq!(err.root().kind(), "timeout");
        assert_eq!(transport.calls(), 3);
        assert_eq!(c.breakers().for_resource(Resource::Customers).failure_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits_retry_loop() {
        let transport = Arc::new(ScriptedTransport::new(server_error()));
        let c = client(transport.clone(), 2);

        // Attempt 1 and 2 fail and trip the breaker, attempt 3 is rejected
        let err = c.fetch_users().await.unwrap_err();
        assert!(matches!(err, UpstreamError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 2);

        let before = Instant::now();
        let err = c.fetch_users().await.unwrap_err();
        assert!(matches!(err, UpstreamError::CircuitOpen { .. }));
        assert_eq!(transport.calls(), 2);
        assert_eq!(before.elapsed(), Duration::ZERO);

        // Payments keep their own breaker
        let posts = Arc::new(ScriptedTransport::new(Ok(json!([]))));
        let c2 = UpstreamClient::new(
            posts,
            BreakerRegistry::new(BreakerConfig::default(), BreakerScope::PerResource),
            RetryPolicy::none(),
            Duration::from_secs(1),
        );
        assert!(c2.fetch_posts().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_after_cooldown_closes_circuit() {
        let transport = Arc::new(
            ScriptedTransport::new(Ok(json!([user_json(1)])))
                .then(server_error())
                .then(server_error()),
        );
        let c = client(transport.clone(), 2);

        assert!(c.fetch_users().await.is_err());
        let breaker = c.breakers().for_resource(Resource::Customers);
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;
        let users = c.fetch_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_is_transient() {
        let transport = Arc::new(ScriptedTransport::new(Ok(json!({"unexpected": true}))));
        let c = client(transport.clone(), 10);

        let err = c.fetch_users().await.unwrap_err();
        assert_eq!(err.root().kind(), "decode");
        assert_eq!(transport.calls(), 3);
    }
}
