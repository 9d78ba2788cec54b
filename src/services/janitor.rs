//! Cache Janitor
//!
//! Expired entries are already invisible to readers; this service only
//! reclaims their memory.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::cache::MemoryCache;

use super::framework::{RestartPolicy, Service, ServiceError, ServiceStatus};

/// Periodically purges expired cache entries
pub struct CacheJanitor {
    cache: Arc<MemoryCache>,
    sweep_interval: Duration,
    status: RwLock<ServiceStatus>,
}

impl CacheJanitor {
    /// Create a janitor sweeping `cache` every `sweep_interval`
    pub fn new(cache: Arc<MemoryCache>, sweep_interval: Duration) -> Self {
        Self {
            cache,
            sweep_interval,
            status: RwLock::new(ServiceStatus::Stopped),
        }
    }
}

#[async_trait::async_trait]
impl Service for CacheJanitor {
    async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError> {
        *self.status.write() = ServiceStatus::Running;
        let mut ticker = tokio::time::interval(self.sweep_interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let removed = self.cache.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, "Cache sweep completed");
                    }
                }
            }
        }

        *self.status.write() = ServiceStatus::Stopped;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cache_janitor"
    }

    fn status(&self) -> ServiceStatus {
        self.status.read().clone()
    }

    fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::Always {
            backoff: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheValue, TransientCache};

    #[tokio::test(start_paused = true)]
    async fn test_janitor_purges_expired_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .set_with_ttl("lock", CacheValue::Marker, Duration::from_secs(5))
            .await
            .unwrap();
        cache.set("counter", CacheValue::Counter(3)).await.unwrap();

        let janitor = Arc::new(CacheJanitor::new(cache.clone(), Duration::from_secs(10)));
        let (tx, rx) = broadcast::channel(1);
        let j = janitor.clone();
        let handle = tokio::spawn(async move { j.start(rx).await });

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.stats().expirations, 1);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(janitor.status(), ServiceStatus::Stopped);
    }
}
