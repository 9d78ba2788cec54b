//! In-process transient cache
//!
//! Entries carry an optional deadline measured on the tokio clock, so tests
//! can drive expiry with a paused runtime. Expired entries are dropped
//! lazily on access and in bulk by [`MemoryCache::purge_expired`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::{CacheValue, TransientCache};
use crate::error::CacheError;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Cache access statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped because their deadline passed
    pub expirations: u64,
    /// Live entries at the time of the snapshot
    pub entries: usize,
}

/// Concurrent in-memory cache with per-entry expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time-to-live of an entry, `None` if absent or non-expiring
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.expires_at.map(|deadline| deadline - now)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            self.expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
            tracing::trace!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Snapshot of access statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }

    fn insert(&self, key: &str, value: CacheValue, expires_at: Option<Instant>) {
        self.entries
            .write()
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }
}

#[async_trait]
impl TransientCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let now = Instant::now();

        // Fast path under the read lock
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
                Some(_) => {}
            }
        }

        // Entry expired, re-check under the write lock before dropping it
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        self.insert(key, value, None);
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.insert(key, value, Some(Instant::now() + ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        let removed = self.entries.write().remove(key);
        Ok(removed.is_some_and(|entry| !entry.is_expired(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("a").await.unwrap(), None);

        cache.set("a", CacheValue::Counter(3)).await.unwrap();
        assert_eq!(cache.get_counter("a").await.unwrap(), Some(3));
        assert!(cache.ttl("a").is_none());

        assert!(cache.remove("a").await.unwrap());
        assert!(!cache.remove("a").await.unwrap());
        assert!(!cache.contains("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_counter_type_mismatch() {
        let cache = MemoryCache::new();
        cache.set("lock", CacheValue::Marker).await.unwrap();
        let err = cache.get_counter("lock").await.unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("lock", CacheValue::Marker, Duration::from_secs(240))
            .await
            .unwrap();
        assert_eq!(cache.ttl("lock"), Some(Duration::from_secs(240)));

        tokio::time::advance(Duration::from_secs(239)).await;
        assert!(cache.contains("lock").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.contains("lock").await.unwrap());
        assert_eq!(cache.stats().expirations, 1);
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_keeps_persistent_entries() {
        let cache = MemoryCache::new();
        cache.set("counter", CacheValue::Counter(1)).await.unwrap();
        cache
            .set_with_ttl("lock", CacheValue::Marker, Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get_counter("counter").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = MemoryCache::new();
        cache.set("k", CacheValue::Marker).await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("missing").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
