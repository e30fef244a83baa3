// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! L1 in-memory cache.
//!
//! DashMap keyed by cache key, each entry stamped with its expiry
//! (`tokio::time::Instant`, so paused test clocks drive expiry). Expired
//! entries are never returned; they are removed lazily on access or by
//! [`MemoryCache::purge_expired`]. When `max_entries` is reached, the entry
//! closest to expiry is evicted to make room.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use super::traits::{CacheBackend, CacheError, MAX_TTL};

/// A cached value and the moment it stops being valid
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Instant,
}

impl CacheEntry {
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Hit/miss counters
#[derive(Debug, Clone)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

pub struct MemoryCache {
    data: DashMap<String, CacheEntry>,
    /// 0 = unbounded
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            data: DashMap::new(),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, including any not yet purged expired ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Remove all expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.data.len());
        if purged > 0 {
            self.evictions.fetch_add(purged as u64, Ordering::Relaxed);
        }
        purged
    }

    #[must_use]
    pub fn stats(&self) -> MemoryCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        MemoryCacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.data.len(),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    fn make_room(&self, incoming_key: &str) {
        if self.max_entries == 0
            || self.data.len() < self.max_entries
            || self.data.contains_key(incoming_key)
        {
            return;
        }

        if self.purge_expired() > 0 && self.data.len() < self.max_entries {
            return;
        }

        let victim = self
            .data
            .iter()
            .min_by_key(|e| e.value().expires_at)
            .map(|e| e.key().clone());

        if let Some(key) = victim {
            self.data.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn tier(&self) -> &'static str {
        "L1"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = Instant::now();
        let expired = match self.data.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // Re-check under the shard lock so a fresh concurrent write survives
            self.data.remove_if(key, |_, entry| entry.is_expired(now));
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError> {
        self.make_room(key);
        self.data.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl.min(MAX_TTL),
            },
        );
        crate::metrics::set_cache_entries(self.data.len());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let before = self.data.len();
        self.data.retain(|k, _| !k.starts_with(prefix));
        Ok(before.saturating_sub(self.data.len()))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.data.clear();
        crate::metrics::set_cache_entries(0);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self.data.get(key).is_some_and(|e| !e.is_expired(now)))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let now = Instant::now();
        Ok(self
            .data
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.expires_at.duration_since(now)))
    }
}
