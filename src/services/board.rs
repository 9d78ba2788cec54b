//! Status board
//!
//! Latest view of every monitored service, written by the pollers and read
//! by the HTTP layer.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::Serialize;

use crate::health::{ProbeOutcome, ServiceSnapshot};
use crate::types::{now_millis, EndpointState};

/// Game backend unreachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outage {
    /// Display state
    pub state: String,
    /// Reason reported by the poller
    pub status: String,
}

/// Latest view of the game services
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameBoard {
    /// Per-service cards, empty while the backend is unreachable
    pub services: Vec<ServiceSnapshot>,
    /// Upstream document timestamp
    pub timestamp: Option<String>,
    /// Last poll time, unix milliseconds
    pub last_check: Option<i64>,
    /// Set while the status document cannot be fetched
    pub outage: Option<Outage>,
}

/// Latest view of a non-game endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointBoard {
    /// Endpoint state
    pub state: EndpointState,
    /// Failure reason, empty when up
    pub status: String,
    /// Last probe time, unix milliseconds
    pub last_check: i64,
}

/// Shared, thread-safe status board
#[derive(Debug, Default)]
pub struct StatusBoard {
    game: RwLock<GameBoard>,
    endpoints: RwLock<BTreeMap<String, EndpointBoard>>,
}

impl StatusBoard {
    /// Create an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the game services view after a successful poll
    pub fn update_game(&self, services: Vec<ServiceSnapshot>, timestamp: Option<String>) {
        *self.game.write() = GameBoard {
            services,
            timestamp,
            last_check: Some(now_millis()),
            outage: None,
        };
    }

    /// Record that the status document could not be fetched
    pub fn game_unavailable(&self, reason: &str) {
        let mut game = self.game.write();
        game.services.clear();
        game.last_check = Some(now_millis());
        game.outage = Some(Outage {
            state: "down".to_string(),
            status: reason.to_string(),
        });
    }

    /// Record the outcome of an endpoint probe
    pub fn update_endpoint(&self, name: &str, outcome: &ProbeOutcome) {
        let (state, status) = match outcome {
            ProbeOutcome::Up => (EndpointState::Up, String::new()),
            ProbeOutcome::Down { message, .. } => (EndpointState::Down, message.clone()),
        };
        self.endpoints.write().insert(
            name.to_string(),
            EndpointBoard {
                state,
                status,
                last_check: now_millis(),
            },
        );
    }

    /// Latest game services view
    pub fn game(&self) -> GameBoard {
        self.game.read().clone()
    }

    /// Latest view of one endpoint
    pub fn endpoint(&self, name: &str) -> Option<EndpointBoard> {
        self.endpoints.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_outage_then_recovery() {
        let board = StatusBoard::new();
        assert!(board.game().last_check.is_none());

        board.game_unavailable("Request failed: timed out");
        let game = board.game();
        assert_eq!(game.outage.unwrap().status, "Request failed: timed out");
        assert!(game.services.is_empty());

        board.update_game(Vec::new(), Some("2019-03-02T10:00:00Z".to_string()));
        let game = board.game();
        assert!(game.outage.is_none());
        assert!(game.last_check.is_some());
    }

    #[test]
    fn test_endpoint_updates() {
        let board = StatusBoard::new();
        board.update_endpoint(
            "HITMAN FORUM",
            &ProbeOutcome::Down {
                code: Some(502),
                message: "Bad Gateway".to_string(),
            },
        );
        let forum = board.endpoint("HITMAN FORUM").unwrap();
        assert_eq!(forum.state, EndpointState::Down);
        assert_eq!(forum.status, "Bad Gateway");

        board.update_endpoint("HITMAN FORUM", &ProbeOutcome::Up);
        assert_eq!(board.endpoint("HITMAN FORUM").unwrap().state, EndpointState::Up);
        assert!(board.endpoint("HITMAN AUTHENTICATION").is_none());
    }
}
