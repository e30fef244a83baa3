use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Longest lifetime any tier will store; longer TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache serialization error for '{key}': {message}")]
    Serialization { key: String, message: String },
}

/// A TTL-aware key/value store.
///
/// Values are JSON documents so one store can hold every resource shape.
/// `get` only ever returns non-expired entries.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short tier label for logs and metrics ("L1", "L2")
    fn tier(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store `value` under `key` for `ttl`, replacing any existing entry.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Remaining time-to-live for `key`, if present and not expired.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
}

/// Typed helpers over any [`CacheBackend`].
#[async_trait]
pub trait CacheBackendExt: CacheBackend {
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| CacheError::Serialization {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<bool, CacheError>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.set(key, value, ttl).await
    }
}

impl<C: CacheBackend + ?Sized> CacheBackendExt for C {}
