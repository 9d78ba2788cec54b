//! Core data types shared by the gate, the pollers and the stores

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a game service as reported by the upstream status document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    /// Upstream does not know the state
    Unknown,
    /// Service unreachable
    Down,
    /// Planned maintenance in progress
    Maintenance,
    /// Service reachable but under high load
    Slow,
    /// Service fully operational
    Healthy,
}

impl ServiceHealth {
    /// Parse the upstream `health` string (case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "unknown" => Some(ServiceHealth::Unknown),
            "down" => Some(ServiceHealth::Down),
            "maintenance" => Some(ServiceHealth::Maintenance),
            "slow" => Some(ServiceHealth::Slow),
            "healthy" => Some(ServiceHealth::Healthy),
            _ => None,
        }
    }
}

/// Binary state of a non-game endpoint (authentication, forum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointState {
    /// Endpoint answered successfully
    Up,
    /// Endpoint failed or timed out
    Down,
}

/// Coarse classification carried by a [`HealthObservation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Classification {
    /// Game service health
    Service(ServiceHealth),
    /// Non-game endpoint state
    Endpoint(EndpointState),
}

/// Display labels for each classification.
///
/// A classification without a label is not an event.
const SERVICE_LABELS: &[(ServiceHealth, &str)] = &[
    (ServiceHealth::Unknown, "Unknown"),
    (ServiceHealth::Down, "Down"),
    (ServiceHealth::Maintenance, "Maintenance"),
    (ServiceHealth::Slow, "High load"),
];

const ENDPOINT_LABELS: &[(EndpointState, &str)] = &[(EndpointState::Down, "Down")];

impl Classification {
    /// Display label stored in event records, `None` when this is not an event
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Classification::Service(health) => SERVICE_LABELS
                .iter()
                .find(|(h, _)| h == health)
                .map(|(_, label)| *label),
            Classification::Endpoint(state) => ENDPOINT_LABELS
                .iter()
                .find(|(s, _)| s == state)
                .map(|(_, label)| *label),
        }
    }

    /// True when the source reports no issue at all
    pub fn is_all_clear(&self) -> bool {
        matches!(
            self,
            Classification::Service(ServiceHealth::Healthy)
                | Classification::Endpoint(EndpointState::Up)
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.label(), self) {
            (Some(label), _) => f.write_str(label),
            (None, Classification::Endpoint(_)) => f.write_str("Up"),
            (None, Classification::Service(_)) => f.write_str("Healthy"),
        }
    }
}

/// A single classified health check result. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthObservation {
    /// Logical source (service or endpoint name)
    pub source: String,
    /// Coarse status
    pub classification: Classification,
    /// Upstream status code, if any
    pub status_code: Option<u16>,
    /// Free-text message
    pub message: Option<String>,
}

impl HealthObservation {
    /// Observation of a game service
    pub fn service(source: impl Into<String>, health: ServiceHealth) -> Self {
        Self {
            source: source.into(),
            classification: Classification::Service(health),
            status_code: None,
            message: None,
        }
    }

    /// Observation of a non-game endpoint
    pub fn endpoint(source: impl Into<String>, state: EndpointState) -> Self {
        Self {
            source: source.into(),
            classification: Classification::Endpoint(state),
            status_code: None,
            message: None,
        }
    }

    /// Attach an upstream status code
    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Build the record to persist, `None` when the classification is not an event
    pub fn to_new_event(&self) -> Option<NewEvent> {
        self.classification.label().map(|label| NewEvent {
            service: self.source.clone(),
            state: label.to_string(),
            status: self.status_code,
            message: self.message.clone(),
        })
    }
}

/// An event accepted by the gate, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Source name
    pub service: String,
    /// Display label of the state
    pub state: String,
    /// Optional status code
    pub status: Option<u16>,
    /// Optional message
    pub message: Option<String>,
}

/// A persisted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Row identifier
    pub id: i64,
    /// Source name
    pub service: String,
    /// Display label of the state
    pub state: String,
    /// Optional status code
    pub status: Option<u16>,
    /// Optional message
    pub message: Option<String>,
    /// Creation time, unix milliseconds, assigned by the store
    pub created_at: i64,
}

/// An outage report submitted by a visitor, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReport {
    /// Catalog reference of the reported service (e.g. `h2pc`)
    pub reference: String,
    /// Browser fingerprint of the reporter
    pub fingerprint: String,
}

/// A persisted outage report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReport {
    /// Row identifier
    pub id: i64,
    /// Catalog reference of the reported service
    pub reference: String,
    /// Browser fingerprint of the reporter
    pub fingerprint: String,
    /// Creation time, unix milliseconds, assigned by the store
    pub created_at: i64,
}

/// Current wall clock time in unix milliseconds
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_health_parse() {
        assert_eq!(ServiceHealth::parse("down"), Some(ServiceHealth::Down));
        assert_eq!(ServiceHealth::parse("HEALTHY"), Some(ServiceHealth::Healthy));
        assert_eq!(ServiceHealth::parse("exploded"), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            Classification::Service(ServiceHealth::Down).label(),
            Some("Down")
        );
        assert_eq!(
            Classification::Service(ServiceHealth::Slow).label(),
            Some("High load")
        );
        // Healthy is not an event
        assert_eq!(Classification::Service(ServiceHealth::Healthy).label(), None);
        assert_eq!(
            Classification::Endpoint(EndpointState::Down).label(),
            Some("Down")
        );
    }

    #[test]
    fn test_to_new_event() {
        let obs = HealthObservation::endpoint("HITMAN FORUM", EndpointState::Down)
            .with_status_code(503)
            .with_message("Service Unavailable");
        let event = obs.to_new_event().unwrap();
        assert_eq!(event.service, "HITMAN FORUM");
        assert_eq!(event.state, "Down");
        assert_eq!(event.status, Some(503));
        assert_eq!(event.message.as_deref(), Some("Service Unavailable"));

        let healthy = HealthObservation::service("HITMAN PC", ServiceHealth::Healthy);
        assert!(healthy.to_new_event().is_none());
        assert!(healthy.classification.is_all_clear());

        let up = HealthObservation::endpoint("HITMAN FORUM", EndpointState::Up);
        assert!(up.to_new_event().is_none());
        assert_eq!(up.classification.to_string(), "Up");
    }
}
