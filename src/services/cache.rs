use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::address;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// Last-known-good values for read paths
///
/// Holds the most recent successful remote reads so a failed refresh can
/// degrade to the previous value instead of an error.
#[derive(Clone)]
pub struct SnapshotCache {
    entries: moka::future::Cache<String, Vec<u8>>,
}

impl SnapshotCache {
    /// Create a new cache
    pub fn new(max_entries: u64, ttl_secs: u64) -> Self {
        let entries = moka::future::CacheBuilder::new(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { entries }
    }

    /// Get a value from cache
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.entries.get(key).await {
            tracing::trace!("Cache hit: {}", key);
            return Ok(serde_json::from_slice(&bytes)?);
        }

        tracing::trace!("Cache miss: {}", key);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value in cache
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec(value)?;
        self.entries.insert(key.to_string(), bytes).await;

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Drop everything, e.g. when the session owner changes
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for user stats
    pub fn stats(address: &str) -> String {
        format!("stats:{}", address::normalize(address))
    }

    /// Build a cache key for a user's match list
    pub fn matches(address: &str) -> String {
        format!("matches:{}", address::normalize(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_set_get_clear() {
        let cache = SnapshotCache::new(100, 60);

        let key = "test_key";
        let value = vec!["a".to_string(), "b".to_string()];

        cache.set(key, &value).await.unwrap();
        let result: Vec<String> = cache.get(key).await.unwrap();
        assert_eq!(result, value);

        cache.clear();
        assert!(matches!(cache.get::<Vec<String>>(key).await, Err(CacheError::CacheMiss(_))));
    }

    #[test]
    fn test_cache_key_builder_normalizes() {
        assert_eq!(CacheKey::stats("0xABC"), "stats:0xabc");
        assert_eq!(CacheKey::matches("0xAbC"), "matches:0xabc");
    }
}
