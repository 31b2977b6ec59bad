//! Byte-oriented key-value cache contract.
//!
//! The cache fronts expensive upstream lookups (service graph, similarity
//! recall, pattern fetches). A miss is a tagged variant, never a nil value,
//! so callers handle it exhaustively. Providers:
//! - [`NoopCache`]: always misses, accepts all writes
//! - [`MemoryCache`]: in-process map with per-entry TTL, used in tests and
//!   single-node deployments
//! - [`ValkeyCache`]: Valkey/Redis-compatible network provider

mod valkey;

pub use valkey::{ValkeyCache, ValkeyConfig};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors produced by cache providers.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is absent. Distinct from every failure mode.
    #[error("cache miss")]
    Miss,

    /// Transport-level failure (dial, read, write).
    #[error("cache i/o: {0}")]
    Io(#[from] std::io::Error),

    /// The server replied with something the protocol does not allow here.
    #[error("cache protocol: {0}")]
    Protocol(String),

    /// The server reported an error reply.
    #[error("cache server: {0}")]
    Server(String),

    /// A configured deadline elapsed before the operation completed.
    #[error("cache deadline exceeded")]
    Timeout,
}

impl CacheError {
    /// True only for the miss variant.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Transient errors are worth one more connection attempt.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout)
    }
}

/// Minimal cache operations needed by the service.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Fetches bytes by key, returning [`CacheError::Miss`] when absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError>;

    /// Stores bytes under `key` for `ttl` (zero means no expiry).
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Stores only if the key does not exist; returns whether it was inserted.
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CacheError>;

    /// Removes a key.
    async fn del(&self, key: &str) -> Result<(), CacheError>;

    /// Releases provider resources.
    async fn close(&self) -> Result<(), CacheError>;
}

/// Provider that never stores data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheProvider for NoopCache {
    async fn get(&self, _key: &str) -> Result<Vec<u8>, CacheError> {
        Err(CacheError::Miss)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn set_nx(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<bool, CacheError> {
        Ok(true)
    }

    async fn del(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// In-process cache with per-entry TTL.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired but not yet evicted) entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(value: &[u8], ttl: Duration) -> MemoryEntry {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        MemoryEntry {
            value: value.to_vec(),
            expires_at,
        }
    }
}

#[async_trait]
impl CacheProvider for MemoryCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Err(CacheError::Miss)
            }
            Some(entry) => Ok(entry.value.clone()),
            None => Err(CacheError::Miss),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(key.to_string(), Self::entry(value, ttl));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        match entries.get(key) {
            Some(existing) if !existing.is_expired() => Ok(false),
            _ => {
                entries.insert(key.to_string(), Self::entry(value, ttl));
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_always_misses() {
        let cache = NoopCache;
        cache.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        assert!(cache.get("k").await.unwrap_err().is_miss());
        assert!(cache.set_nx("k", b"v", Duration::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn memory_round_trip() {
        let cache = MemoryCache::new();
        cache
            .set("graph", b"edges", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("graph").await.unwrap(), b"edges");

        cache.del("graph").await.unwrap();
        assert!(cache.get("graph").await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn memory_respects_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("short", b"v", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(cache.get("short").await.unwrap(), b"v");

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("short").await.unwrap_err().is_miss());
    }

    #[tokio::test]
    async fn memory_set_nx_reports_existing_keys() {
        let cache = MemoryCache::new();
        assert!(cache.set_nx("lock", b"a", Duration::ZERO).await.unwrap());
        assert!(!cache.set_nx("lock", b"b", Duration::ZERO).await.unwrap());
        assert_eq!(cache.get("lock").await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn memory_set_nx_replaces_expired_entries() {
        let cache = MemoryCache::new();
        cache
            .set("lock", b"old", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.set_nx("lock", b"new", Duration::ZERO).await.unwrap());
        assert_eq!(cache.get("lock").await.unwrap(), b"new");
    }
}
