// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Two-tier cache store: L1 memory in front of an optional durable L2.
//!
//! ```text
//! get:  L1 hit? ──yes──▶ value
//!         │ no
//!         ▼
//!       L2 hit? ──yes──▶ back-fill L1 (remaining TTL) ──▶ value
//!         │ no / L2 error (logged)
//!         ▼
//!       miss
//!
//! set:  L1 always, L2 best-effort (errors logged, never surfaced)
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::memory::MemoryCache;
use super::traits::{CacheBackend, CacheError};

pub struct TieredCache {
    l1: Arc<MemoryCache>,
    l2: RwLock<Option<Arc<dyn CacheBackend>>>,
    default_ttl: Duration,
}

impl TieredCache {
    /// Memory-only cache store.
    #[must_use]
    pub fn memory_only(l1: Arc<MemoryCache>, default_ttl: Duration) -> Self {
        Self {
            l1,
            l2: RwLock::new(None),
            default_ttl,
        }
    }

    /// Cache store backed by an L2 tier.
    #[must_use]
    pub fn with_l2(l1: Arc<MemoryCache>, l2: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            l1,
            l2: RwLock::new(Some(l2)),
            default_ttl,
        }
    }

    /// Attach an L2 tier after construction (used by gateway `init()`).
    pub fn attach_l2(&self, l2: Arc<dyn CacheBackend>) {
        *self.l2.write() = Some(l2);
    }

    /// Drop the L2 tier; later operations are L1-only.
    pub fn detach_l2(&self) -> Option<Arc<dyn CacheBackend>> {
        self.l2.write().take()
    }

    fn l2(&self) -> Option<Arc<dyn CacheBackend>> {
        self.l2.read().clone()
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    #[must_use]
    pub fn l1(&self) -> &Arc<MemoryCache> {
        &self.l1
    }

    #[must_use]
    pub fn has_l2(&self) -> bool {
        self.l2.read().is_some()
    }

    /// Store with the configured default TTL.
    pub async fn set_default(&self, key: &str, value: Value) -> Result<bool, CacheError> {
        self.set(key, value, self.default_ttl).await
    }

    fn l2_failed(&self, l2: &dyn CacheBackend, operation: &str, key: &str, err: &CacheError) {
        warn!(tier = l2.tier(), operation, key, error = %err, "L2 cache operation failed, continuing");
        crate::metrics::record_cache_error(l2.tier(), operation);
    }
}

#[async_trait]
impl CacheBackend for TieredCache {
    fn tier(&self) -> &'static str {
        "tiered"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        if let Some(value) = self.l1.get(key).await? {
            crate::metrics::record_cache("L1", "hit");
            return Ok(Some(value));
        }
        crate::metrics::record_cache("L1", "miss");

        let Some(l2) = self.l2() else {
            return Ok(None);
        };
        let l2 = l2.as_ref();

        match l2.get(key).await {
            Ok(Some(value)) => {
                crate::metrics::record_cache(l2.tier(), "hit");
                let ttl = match l2.ttl(key).await {
                    Ok(Some(remaining)) => remaining,
                    // Expired between GET and PTTL
                    Ok(None) => {
                        debug!(key, "L2 entry expired during read, not back-filling");
                        return Ok(Some(value));
                    }
                    Err(_) => self.default_ttl,
                };
                debug!(key, ?ttl, "Back-filling L1 from L2");
                self.l1.set(key, value.clone(), ttl).await?;
                Ok(Some(value))
            }
            Ok(None) => {
                crate::metrics::record_cache(l2.tier(), "miss");
                Ok(None)
            }
            Err(e) => {
                self.l2_failed(l2, "get", key, &e);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError> {
        if let Some(l2) = self.l2().as_deref() {
            if let Err(e) = l2.set(key, value.clone(), ttl).await {
                self.l2_failed(l2, "set", key, &e);
            }
        }
        self.l1.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut removed = self.l1.delete(key).await?;
        if let Some(l2) = self.l2().as_deref() {
            match l2.delete(key).await {
                Ok(r) => removed |= r,
                Err(e) => self.l2_failed(l2, "delete", key, &e),
            }
        }
        Ok(removed)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut removed = self.l1.delete_prefix(prefix).await?;
        if let Some(l2) = self.l2().as_deref() {
            match l2.delete_prefix(prefix).await {
                Ok(r) => removed = removed.max(r),
                Err(e) => self.l2_failed(l2, "delete_prefix", prefix, &e),
            }
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.l1.clear().await?;
        if let Some(l2) = self.l2().as_deref() {
            if let Err(e) = l2.clear().await {
                self.l2_failed(l2, "clear", "*", &e);
            }
        }
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        if self.l1.has(key).await? {
            return Ok(true);
        }
        match self.l2().as_deref() {
            Some(l2) => Ok(l2.has(key).await.unwrap_or(false)),
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        if let Some(ttl) = self.l1.ttl(key).await? {
            return Ok(Some(ttl));
        }
        match self.l2().as_deref() {
            Some(l2) => Ok(l2.ttl(key).await.unwrap_or(None)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// L2 stand-in that can be switched into a failing state
    struct FlakyL2 {
        inner: MemoryCache,
        down: AtomicBool,
    }

    impl FlakyL2 {
        fn new() -> Self {
            Self {
                inner: MemoryCache::new(),
                down: AtomicBool::new(false),
            }
        }

        fn check(&self) -> Result<(), CacheError> {
            if self.down.load(Ordering::SeqCst) {
                Err(CacheError::Backend("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheBackend for FlakyL2 {
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

    /// L2 whose entry expires between the read and the TTL lookup
    struct ExpiringL2;

    #[async_trait]
    impl CacheBackend for ExpiringL2 {
        fn tier(&self) -> &'static str {
            "L2"
        }
        async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
            Ok(Some(json!("last read")))
        }
        async fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<bool, CacheError> {
            Ok(true)
        }
        async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Ok(false)
        }
        async fn delete_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
            Ok(0)
        }
        async fn clear(&self) -> Result<(), CacheError> {
            Ok(())
        }
        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CacheError> {
            Ok(None)
        }
    }

    fn tiered(l2: Arc<FlakyL2>) -> TieredCache {
        TieredCache::with_l2(Arc::new(MemoryCache::new()), l2, Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_l2_hit_backfills_l1_with_remaining_ttl() {
        let l2 = Arc::new(FlakyL2::new());
        l2.inner.set("k", json!(7), Duration::from_secs(20)).await.unwrap();
        let cache = tiered(l2);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some(json!(7)));
        assert_eq!(cache.l1().ttl("k").await.unwrap(), Some(Duration::from_secs(15)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_l2_entry_expiring_mid_read_is_not_backfilled() {
        let l1 = Arc::new(MemoryCache::new());
        let cache = TieredCache::with_l2(l1.clone(), Arc::new(ExpiringL2), Duration::from_secs(60));

        assert_eq!(cache.get("k").await.unwrap(), Some(json!("last read")));
        assert!(!l1.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_l2_down_is_not_fatal() {
        let l2 = Arc::new(FlakyL2::new());
        let cache = tiered(l2.clone());
        l2.down.store(true, Ordering::SeqCst);

        assert!(cache.set_default("k", json!("v")).await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("v")));
        assert_eq!(cache.get("missing").await.unwrap(), None);
        assert!(cache.delete("k").await.unwrap());
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_write_through_reaches_both_tiers() {
        let l2 = Arc::new(FlakyL2::new());
        let cache = tiered(l2.clone());

        cache.set("k", json!({"a": 1}), Duration::from_secs(5)).await.unwrap();
        assert!(cache.l1().has("k").await.unwrap());
        assert!(l2.inner.has("k").await.unwrap());

        assert_eq!(cache.delete_prefix("k").await.unwrap(), 1);
        assert!(!l2.inner.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_only_default_ttl() {
        let cache = TieredCache::memory_only(Arc::new(MemoryCache::new()), Duration::from_secs(42));
        assert!(!cache.has_l2());
        cache.set_default("k", json!(1)).await.unwrap();
        let ttl = cache.ttl("k").await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(42));
    }
}
