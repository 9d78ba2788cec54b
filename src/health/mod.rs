//! Health classification
//!
//! Turns the upstream status document into the normalized signal the gate
//! consumes, and into the per-service snapshot shown on the dashboard.
//!
//! - **Catalog**: the monitored services and their upstream nodes
//! - **Document**: the upstream JSON status document
//! - **Source**: traits for fetching the document and probing endpoints

use serde::Serialize;

use crate::types::{HealthObservation, ServiceHealth};

pub mod catalog;
pub mod document;
pub mod source;

pub use catalog::{CatalogEntry, ServiceKind, CATALOG};
pub use document::{ElusiveTarget, MaintenanceWindow, ServiceEntry, StatusDocument};
pub use source::{EndpointProbe, HealthSource, HttpEndpointProbe, HttpHealthSource, ProbeOutcome};

/// Upstream state meaning the service cannot be reached
pub const STATE_NOT_AVAILABLE: &str = "UI_GAME_SERVICE_NOT_AVAILABLE";

/// Upstream maintenance window status meaning the service is down for maintenance
pub const STATE_DOWN_MAINTENANCE: &str = "UI_GAME_SERVICE_DOWN_MAINTENANCE";

/// Status shown on a service card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    /// Operational
    Up,
    /// Operational under high load
    Warn,
    /// Unreachable
    Down,
    /// Planned maintenance
    Maintenance,
    /// No information
    Unknown,
}

impl DisplayStatus {
    fn from_health(health: ServiceHealth) -> Self {
        match health {
            ServiceHealth::Healthy => DisplayStatus::Up,
            ServiceHealth::Slow => DisplayStatus::Warn,
            ServiceHealth::Down => DisplayStatus::Down,
            ServiceHealth::Maintenance => DisplayStatus::Maintenance,
            ServiceHealth::Unknown => DisplayStatus::Unknown,
        }
    }
}

/// Dashboard view of one game service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSnapshot {
    /// Catalog reference
    pub reference: &'static str,
    /// Display name
    pub name: &'static str,
    /// Card status
    pub status: DisplayStatus,
    /// Card subtitle
    pub title: String,
    /// Raw upstream state
    pub state: Option<String>,
    /// Next scheduled maintenance window
    pub next_window: Option<MaintenanceWindow>,
    /// Currently running elusive target
    pub elusive: Option<ElusiveTarget>,
}

/// Classify every game service of the catalog from an upstream document.
///
/// Nodes missing from the document are reported as unknown; health strings
/// that cannot be parsed are skipped.
pub fn classify(document: &StatusDocument) -> Vec<HealthObservation> {
    CATALOG
        .iter()
        .filter(|entry| entry.kind == ServiceKind::Game)
        .filter_map(|entry| {
            let health = match document.services.get(entry.node) {
                Some(service) => ServiceHealth::parse(&service.health)?,
                None => ServiceHealth::Unknown,
            };
            let mut observation = HealthObservation::service(entry.name, health);
            if let Some(state) = document.services.get(entry.node).and_then(|s| s.status.clone()) {
                observation = observation.with_message(state);
            }
            Some(observation)
        })
        .collect()
}

/// Build the dashboard snapshot of every game service
pub fn snapshot(document: &StatusDocument) -> Vec<ServiceSnapshot> {
    CATALOG
        .iter()
        .filter(|entry| entry.kind == ServiceKind::Game)
        .map(|entry| {
            let elusive = document
                .elusives
                .get(entry.node)
                .and_then(|targets| targets.first().cloned());

            let Some(service) = document.services.get(entry.node) else {
                return ServiceSnapshot {
                    reference: entry.reference,
                    name: entry.name,
                    status: DisplayStatus::Unknown,
                    title: String::new(),
                    state: None,
                    next_window: None,
                    elusive,
                };
            };

            let in_maintenance = service.status.as_deref() == Some(STATE_NOT_AVAILABLE)
                && service
                    .next_window
                    .as_ref()
                    .and_then(|w| w.status.as_deref())
                    == Some(STATE_DOWN_MAINTENANCE);

            let status = if in_maintenance {
                DisplayStatus::Maintenance
            } else {
                ServiceHealth::parse(&service.health)
                    .map(DisplayStatus::from_health)
                    .unwrap_or(DisplayStatus::Unknown)
            };

            let title = if status == DisplayStatus::Warn {
                "high load".to_string()
            } else {
                String::new()
            };

            ServiceSnapshot {
                reference: entry.reference,
                name: entry.name,
                status,
                title,
                state: service.status.clone(),
                next_window: service.next_window.clone(),
                elusive,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;

    const DOCUMENT: &str = r#"{
        "timestamp": "2019-03-02T10:00:00Z",
        "services": {
            "pc-service.hitman.io": { "health": "healthy" },
            "ps4-service.hitman.io": { "health": "slow" },
            "xboxone-service.hitman.io": { "health": "down" },
            "pc2-service.hitman.io": {
                "health": "down",
                "status": "UI_GAME_SERVICE_NOT_AVAILABLE",
                "nextWindow": {
                    "start": "2019-03-02T09:00:00Z",
                    "end": "2019-03-02T12:00:00Z",
                    "status": "UI_GAME_SERVICE_DOWN_MAINTENANCE"
                }
            },
            "ps42-service.hitman.io": { "health": "sideways" }
        },
        "elusives": {
            "pc2-service.hitman.io": [{
                "name": "The Undying Returns",
                "tile": "images/undying.jpg",
                "description": "Mark Faba is back",
                "location": "Paris",
                "nextWindow": { "start": "2019-03-01T17:00:00Z", "end": "2019-03-11T17:00:00Z" }
            }]
        }
    }"#;

    #[test]
    fn test_classify() {
        let document = StatusDocument::parse(DOCUMENT).unwrap();
        let observations = classify(&document);

        let find = |name: &str| observations.iter().find(|o| o.source == name).cloned();

        assert_eq!(
            find("HITMAN PC").unwrap().classification,
            Classification::Service(ServiceHealth::Healthy)
        );
        assert_eq!(
            find("HITMAN PS4").unwrap().classification,
            Classification::Service(ServiceHealth::Slow)
        );
        // Unparseable health is skipped
        assert!(find("HITMAN 2 PS4").is_none());
        // Missing node is unknown
        assert_eq!(
            find("HITMAN 2 XBOX ONE").unwrap().classification,
            Classification::Service(ServiceHealth::Unknown)
        );
        assert_eq!(
            find("HITMAN 2 PC").unwrap().message.as_deref(),
            Some(STATE_NOT_AVAILABLE)
        );
    }

    #[test]
    fn test_snapshot_statuses() {
        let document = StatusDocument::parse(DOCUMENT).unwrap();
        let cards = snapshot(&document);
        let card = |reference: &str| cards.iter().find(|c| c.reference == reference).unwrap();

        assert_eq!(card("h1pc").status, DisplayStatus::Up);
        assert_eq!(card("h1ps").status, DisplayStatus::Warn);
        assert_eq!(card("h1ps").title, "high load");
        assert_eq!(card("h1xb").status, DisplayStatus::Down);
        assert_eq!(card("h2ps").status, DisplayStatus::Unknown);
        assert_eq!(card("h2xb").status, DisplayStatus::Unknown);

        let h2pc = card("h2pc");
        assert_eq!(h2pc.status, DisplayStatus::Maintenance);
        assert!(h2pc.next_window.is_some());
        assert_eq!(h2pc.elusive.as_ref().unwrap().name, "The Undying Returns");
    }
}
