//! Game Status Poller
//!
//! Periodically fetches the upstream status document and:
//! - refreshes the game services view of the status board
//! - feeds the classified observations to the gate under the aggregate key
//! - reports a failed fetch as an authentication endpoint event

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::gate::{DebounceGate, GateDecision, HITMAN_AUTHENTICATION, HITMAN_SERVICES};
use crate::health::{self, HealthSource, ProbeOutcome};

use super::board::StatusBoard;
use super::framework::{RestartPolicy, Service, ServiceError, ServiceStatus};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the game status poller
#[derive(Debug, Clone)]
pub struct GameStatusConfig {
    /// Interval between polls
    pub poll_interval: Duration,
}

impl Default for GameStatusConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Game Status Poller
// ============================================================================

/// Background service polling the game backend status document
pub struct GameStatusPoller {
    /// Configuration
    config: GameStatusConfig,

    /// Upstream document source
    source: Arc<dyn HealthSource>,

    /// Debounce gate
    gate: Arc<DebounceGate>,

    /// Shared status board
    board: Arc<StatusBoard>,

    /// Current service status
    status: RwLock<ServiceStatus>,

    /// Completed poll cycles
    cycles: AtomicU64,
}

impl GameStatusPoller {
    /// Create a new poller
    pub fn new(
        config: GameStatusConfig,
        source: Arc<dyn HealthSource>,
        gate: Arc<DebounceGate>,
        board: Arc<StatusBoard>,
    ) -> Self {
        Self {
            config,
            source,
            gate,
            board,
            status: RwLock::new(ServiceStatus::Stopped),
            cycles: AtomicU64::new(0),
        }
    }

    /// Number of completed poll cycles
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Run a single poll cycle
    pub async fn poll_once(&self) -> Result<GateDecision, ServiceError> {
        let start = Instant::now();

        let decision = match self.source.fetch().await {
            Ok(document) => {
                self.board
                    .update_game(health::snapshot(&document), document.timestamp.clone());
                self.board
                    .update_endpoint(HITMAN_AUTHENTICATION, &ProbeOutcome::Up);

                let observations = health::classify(&document);
                self.gate
                    .submit_aggregate(HITMAN_SERVICES, &observations)
                    .await?
            }
            Err(e) => {
                tracing::warn!(error = %e, "Game status document unavailable");
                let outcome = ProbeOutcome::from_error(&e);
                self.board.game_unavailable(&e.to_string());
                self.board.update_endpoint(HITMAN_AUTHENTICATION, &outcome);

                self.gate
                    .submit(
                        HITMAN_AUTHENTICATION,
                        &outcome.to_observation(HITMAN_AUTHENTICATION),
                    )
                    .await?
            }
        };

        self.cycles.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            decision = ?decision,
            duration_ms = start.elapsed().as_millis(),
            "Game status poll completed"
        );

        Ok(decision)
    }
}

#[async_trait::async_trait]
impl Service for GameStatusPoller {
    async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError> {
        *self.status.write() = ServiceStatus::Running;
        tracing::info!(
            interval_secs = self.config.poll_interval.as_secs(),
            "Game status poller started"
        );

        let mut poll_interval = interval(self.config.poll_interval);
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Shutdown signal received
                result = shutdown.recv() => {
                    match result {
                        Ok(()) | Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Game status poller received shutdown signal");
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!(missed = n, "Game status poller broadcast receiver lagged");
                        }
                    }
                }

                // Periodic poll
                _ = poll_interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "Game status poll failed");
                    }
                }
            }
        }

        *self.status.write() = ServiceStatus::Stopped;
        tracing::info!("Game status poller stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "game_status_poller"
    }

    fn status(&self) -> ServiceStatus {
        self.status.read().clone()
    }

    fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::Always {
            backoff: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
