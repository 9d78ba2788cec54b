//! Transient Cache Module
//!
//! Short-lived key-value state used for coordination, never for business
//! data. The debounce gate keeps its occurrence counters and lockout markers
//! here, and the report service keeps its per-fingerprint cooldowns.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐
//! │ DebounceGate │   │ ReportService  │
//! └──────┬───────┘   └───────┬────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌─────────────────────────────────────┐
//! │     TransientCache (trait)          │
//! │  get / set / set_with_ttl / remove  │
//! ├─────────────────────────────────────┤
//! │     MemoryCache (in-process)        │
//! │  RwLock<HashMap>, lazy expiry       │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hitmanstat::cache::{CacheValue, MemoryCache, TransientCache};
//!
//! let cache = MemoryCache::new();
//! cache.set("counter", CacheValue::Counter(1)).await?;
//! cache.set_with_ttl("lock", CacheValue::Marker, Duration::from_secs(240)).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

mod memory;
pub use memory::{CacheStats, MemoryCache};

/// Value held by a cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    /// Occurrence counter
    Counter(u32),
    /// Presence-only marker
    Marker,
}

/// Key-value store with optional per-entry time-to-live
#[async_trait]
pub trait TransientCache: Send + Sync {
    /// Get a live entry
    async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError>;

    /// Set an entry that never expires on its own
    async fn set(&self, key: &str, value: CacheValue) -> Result<(), CacheError>;

    /// Set an entry that expires after `ttl`
    async fn set_with_ttl(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Remove an entry, returning whether a live entry existed
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Read a counter entry
    async fn get_counter(&self, key: &str) -> Result<Option<u32>, CacheError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(CacheValue::Counter(n)) => Ok(Some(n)),
            Some(CacheValue::Marker) => Err(CacheError::TypeMismatch {
                key: key.to_string(),
                expected: "counter",
            }),
        }
    }

    /// Check whether a live entry exists
    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }
}
