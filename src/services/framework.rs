//! Service Framework
//!
//! Lifecycle management for background services: a common [`Service`]
//! trait, restart policies, and a [`ServiceManager`] that spawns every
//! registered service under a supervisor and broadcasts shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::{Error, UpstreamError};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by background services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Service could not start
    #[error("Startup failed: {0}")]
    Startup(String),

    /// Upstream could not be polled
    #[error("Upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    /// Gate or storage failure while processing a cycle
    #[error("Processing failed: {0}")]
    Processing(#[from] Error),
}

// ============================================================================
// Status and policies
// ============================================================================

/// Lifecycle state of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Not running
    Stopped,
    /// Running its main loop
    Running,
    /// Last run ended with an error
    Failed(String),
}

impl ServiceStatus {
    /// True when the service is running normally
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceStatus::Running)
    }
}

/// What the supervisor does when a service's `start` returns an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Leave it stopped
    Never,
    /// Restart after `backoff`, forever
    Always {
        /// Delay before restarting
        backoff: Duration,
    },
    /// Restart after `backoff`, at most `max_retries` times
    OnFailure {
        /// Maximum restarts
        max_retries: u32,
        /// Delay before restarting
        backoff: Duration,
    },
}

impl RestartPolicy {
    /// Backoff before restart attempt number `attempt` (1-based), `None` to give up
    pub fn next_backoff(&self, attempt: u32) -> Option<Duration> {
        match self {
            RestartPolicy::Never => None,
            RestartPolicy::Always { backoff } => Some(*backoff),
            RestartPolicy::OnFailure {
                max_retries,
                backoff,
            } => (attempt <= *max_retries).then_some(*backoff),
        }
    }
}

/// A long-running background service
#[async_trait::async_trait]
pub trait Service: Send + Sync {
    /// Run until `shutdown` fires
    async fn start(&self, shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError>;

    /// Unique service name
    fn name(&self) -> &'static str;

    /// Current status
    fn status(&self) -> ServiceStatus;

    /// Restart behaviour on failure
    fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::Never
    }
}

// ============================================================================
// Service Manager
// ============================================================================

/// Starts, supervises and stops background services
pub struct ServiceManager {
    services: RwLock<Vec<Arc<dyn Service>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: Arc<AtomicBool>,
}

impl Default for ServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager {
    /// Create an empty manager
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            services: RwLock::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a service; it is started by the next [`start_all`](Self::start_all)
    pub fn register(&self, service: Arc<dyn Service>) {
        self.services.write().push(service);
    }

    /// Spawn every registered service under a supervisor
    pub fn start_all(&self) {
        let services = self.services.read().clone();
        let mut handles = self.handles.lock();

        for service in services {
            let shutdown_tx = self.shutdown_tx.clone();
            let shutting_down = Arc::clone(&self.shutting_down);
            tracing::info!(service = service.name(), "Starting service");
            handles.push(tokio::spawn(supervise(service, shutdown_tx, shutting_down)));
        }
    }

    /// Name and status of every registered service
    pub fn status(&self) -> Vec<(&'static str, ServiceStatus)> {
        self.services
            .read()
            .iter()
            .map(|s| (s.name(), s.status()))
            .collect()
    }

    /// True when every registered service is running
    pub fn is_healthy(&self) -> bool {
        self.services.read().iter().all(|s| s.status().is_healthy())
    }

    /// Signal shutdown and wait for every supervisor to finish
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        // No receivers just means nothing is running
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Service task panicked");
            }
        }
        tracing::info!("All services stopped");
    }
}

async fn supervise(
    service: Arc<dyn Service>,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: Arc<AtomicBool>,
) {
    let mut attempt = 0;

    loop {
        // Subscribe before checking the flag so a concurrent shutdown is never missed
        let shutdown = shutdown_tx.subscribe();
        if shutting_down.load(Ordering::SeqCst) {
            break;
        }

        let result = service.start(shutdown).await;
        if shutting_down.load(Ordering::SeqCst) {
            break;
        }

        let error = match result {
            Ok(()) => break,
            Err(e) => e,
        };

        attempt += 1;
        match service.restart_policy().next_backoff(attempt) {
            Some(backoff) => {
                tracing::warn!(
                    service = service.name(),
                    error = %error,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    "Service failed, restarting"
                );
                let mut shutdown = shutdown_tx.subscribe();
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.recv() => break,
                }
            }
            None => {
                tracing::error!(service = service.name(), error = %error, "Service failed, giving up");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct FlakyService {
        runs: AtomicU32,
        fail_first: u32,
        status: RwLock<ServiceStatus>,
    }

    #[async_trait::async_trait]
    impl Service for FlakyService {
        async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if run <= self.fail_first {
                *self.status.write() = ServiceStatus::Failed("boom".to_string());
                return Err(ServiceError::Startup("boom".to_string()));
            }
            *self.status.write() = ServiceStatus::Running;
            let _ = shutdown.recv().await;
            *self.status.write() = ServiceStatus::Stopped;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }

        fn status(&self) -> ServiceStatus {
            self.status.read().clone()
        }

        fn restart_policy(&self) -> RestartPolicy {
            RestartPolicy::OnFailure {
                max_retries: 3,
                backoff: Duration::from_millis(10),
            }
        }
    }

    #[test]
    fn test_restart_policy_backoff() {
        let policy = RestartPolicy::OnFailure {
            max_retries: 2,
            backoff: Duration::from_secs(5),
        };
        assert_eq!(policy.next_backoff(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_backoff(2), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_backoff(3), None);
        assert_eq!(RestartPolicy::Never.next_backoff(1), None);
    }

    #[tokio::test]
    async fn test_manager_restarts_and_stops() {
        let service = Arc::new(FlakyService {
            runs: AtomicU32::new(0),
            fail_first: 2,
            status: RwLock::new(ServiceStatus::Stopped),
        });

        let manager = ServiceManager::new();
        manager.register(service.clone());
        manager.start_all();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(service.runs.load(Ordering::SeqCst), 3);
        assert!(manager.is_healthy());

        manager.shutdown().await;
        assert_eq!(service.status(), ServiceStatus::Stopped);
        assert_eq!(manager.status(), vec![("flaky", ServiceStatus::Stopped)]);
    }
}
