//! Endpoint Poller
//!
//! Probes one non-game endpoint on a fixed interval. Every outcome refreshes
//! the status board; only failures reach the gate, under the endpoint's own
//! key.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::gate::{DebounceGate, GateDecision};
use crate::health::{EndpointProbe, ProbeOutcome};

use super::board::StatusBoard;
use super::framework::{RestartPolicy, Service, ServiceError, ServiceStatus};

/// Background service probing a single endpoint
pub struct EndpointPoller {
    poll_interval: Duration,
    probe: Arc<dyn EndpointProbe>,
    gate: Arc<DebounceGate>,
    board: Arc<StatusBoard>,
    status: RwLock<ServiceStatus>,
}

impl EndpointPoller {
    /// Create a poller for `probe`
    pub fn new(
        poll_interval: Duration,
        probe: Arc<dyn EndpointProbe>,
        gate: Arc<DebounceGate>,
        board: Arc<StatusBoard>,
    ) -> Self {
        Self {
            poll_interval,
            probe,
            gate,
            board,
            status: RwLock::new(ServiceStatus::Stopped),
        }
    }

    /// Probe once. Returns `None` when the endpoint is up.
    pub async fn poll_once(&self) -> Result<Option<GateDecision>, ServiceError> {
        let name = self.probe.name();
        let outcome = self.probe.probe().await;
        self.board.update_endpoint(name, &outcome);

        match &outcome {
            ProbeOutcome::Up => {
                tracing::trace!(endpoint = name, "Endpoint up");
                Ok(None)
            }
            ProbeOutcome::Down { code, message } => {
                tracing::warn!(endpoint = name, code = ?code, message = %message, "Endpoint down");
                let decision = self
                    .gate
                    .submit(name, &outcome.to_observation(name))
                    .await?;
                Ok(Some(decision))
            }
        }
    }
}

#[async_trait::async_trait]
impl Service for EndpointPoller {
    async fn start(&self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServiceError> {
        *self.status.write() = ServiceStatus::Running;
        tracing::info!(endpoint = self.probe.name(), "Endpoint poller started");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = shutdown.recv() => {
                    if !matches!(result, Err(broadcast::error::RecvError::Lagged(_))) {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(endpoint = self.probe.name(), error = %e, "Endpoint poll failed");
                    }
                }
            }
        }

        *self.status.write() = ServiceStatus::Stopped;
        tracing::info!(endpoint = self.probe.name(), "Endpoint poller stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "endpoint_poller"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::gate::HITMAN_FORUM;
    use crate::storage::MemoryStore;
    use crate::types::EndpointState;
    use parking_lot::Mutex;

    struct StubProbe {
        outcome: Mutex<ProbeOutcome>,
    }

    #[async_trait::async_trait]
    impl EndpointProbe for StubProbe {
        fn name(&self) -> &str {
            HITMAN_FORUM
        }

        async fn probe(&self) -> ProbeOutcome {
            self.outcome.lock().clone()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_go_through_gate() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let gate = Arc::new(DebounceGate::with_defaults(cache, store.clone()));
        let board = Arc::new(StatusBoard::new());
        let probe = Arc::new(StubProbe {
            outcome: Mutex::new(ProbeOutcome::Down {
                code: Some(502),
                message: "Bad Gateway".to_string(),
            }),
        });
        let poller = EndpointPoller::new(
            Duration::from_secs(60),
            probe.clone(),
            gate.clone(),
            board.clone(),
        );

        assert_eq!(poller.poll_once().await.unwrap(), Some(GateDecision::Isolated));
        assert!(matches!(
            poller.poll_once().await.unwrap(),
            Some(GateDecision::Persisted { counter: 2, .. })
        ));
        assert_eq!(poller.poll_once().await.unwrap(), Some(GateDecision::Locked));
        assert_eq!(store.event_count(), 1);
        assert_eq!(board.endpoint(HITMAN_FORUM).unwrap().state, EndpointState::Down);

        // Recovery updates the board but leaves the gate history alone
        *probe.outcome.lock() = ProbeOutcome::Up;
        assert_eq!(poller.poll_once().await.unwrap(), None);
        assert_eq!(board.endpoint(HITMAN_FORUM).unwrap().state, EndpointState::Up);
        let state = gate.state(HITMAN_FORUM).await.unwrap().unwrap();
        assert_eq!(state.counter, Some(2));
    }
}
