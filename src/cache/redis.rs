// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis backend for the durable L2 cache tier.
//!
//! Entries are stored as JSON strings with a native Redis expiry
//! (`PSETEX`), so Redis itself enforces the TTL:
//!
//! ```text
//! gateway:customers:list                 → "[{...}, {...}]"   PTTL 298512
//! gateway:payments:get:id=7              → "{...}"            PTTL 41200
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::traits::{CacheBackend, CacheError, MAX_TTL};
use crate::resilience::retry::{retry, Retryable, RetryPolicy};

impl Retryable for redis::RedisError {
    fn is_retryable(&self) -> bool {
        self.is_io_error() || self.is_connection_refusal() || self.is_timeout() || self.is_connection_dropped()
    }
}

fn backend(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

pub struct RedisCache {
    connection: ConnectionManager,
    /// Optional key prefix for namespacing (e.g., "gateway:" → "gateway:customers:list")
    prefix: String,
}

impl RedisCache {
    /// Connect without a key prefix.
    pub async fn new(connection_string: &str) -> Result<Self, CacheError> {
        Self::with_prefix(connection_string, None).await
    }

    /// Connect with an optional key prefix.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use legacy_gateway::cache::redis::RedisCache;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let cache = RedisCache::with_prefix("redis://localhost", Some("gateway:")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_prefix(connection_string: &str, prefix: Option<&str>) -> Result<Self, CacheError> {
        let client = Client::open(connection_string).map_err(backend)?;

        // Startup policy: fail fast on bad config instead of hanging
        let connection = retry("redis_connect", &RetryPolicy::startup(), |_| {
            ConnectionManager::new(client.clone())
        })
        .await
        .map_err(|e| backend(e.into_inner()))?;

        info!(prefix = prefix.unwrap_or(""), "Connected L2 cache tier");
        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Collect all keys matching `pattern` via incremental SCAN.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(backend)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn tier(&self) -> &'static str {
        "L2"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(self.prefixed_key(key)).await.map_err(backend)?;

        raw.map(|s| {
            serde_json::from_str(&s).map_err(|e| CacheError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let body = serde_json::to_string(&value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        // PSETEX rejects 0
        let millis = (ttl.min(MAX_TTL).as_millis() as u64).max(1);

        let _: () = conn
            .pset_ex(self.prefixed_key(key), body, millis)
            .await
            .map_err(backend)?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(self.prefixed_key(key)).await.map_err(backend)?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let scoped = self.prefixed_key(prefix);
        if scoped.is_empty() {
            // Unprefixed: the keyspace may belong to other applications
            return Err(CacheError::Backend(
                "refusing to delete every key of an unprefixed keyspace; set a key prefix".into(),
            ));
        }
        let pattern = format!("{}*", scoped);
        let keys = self.scan_keys(&pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(&keys).await.map_err(backend)?;
        Ok(removed.max(0) as usize)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        // Our namespace only; fails without a prefix
        self.delete_prefix("").await.map(|_| ())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        conn.exists(self.prefixed_key(key)).await.map_err(backend)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.connection.clone();
        let pttl: i64 = conn.pttl(self.prefixed_key(key)).await.map_err(backend)?;
        // -2 = missing, -1 = no expiry (never written by us)
        Ok((pttl >= 0).then(|| Duration::from_millis(pttl as u64)))
    }
}
