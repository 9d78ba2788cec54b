//! Upstream status document

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// Status document published by the game backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StatusDocument {
    /// Upstream generation time
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Per-node service state
    #[serde(default)]
    pub services: HashMap<String, ServiceEntry>,

    /// Per-node elusive targets, current first
    #[serde(default)]
    pub elusives: HashMap<String, Vec<ElusiveTarget>>,
}

impl StatusDocument {
    /// Parse a JSON document
    pub fn parse(raw: &str) -> Result<Self, UpstreamError> {
        serde_json::from_str(raw).map_err(|e| UpstreamError::InvalidDocument(e.to_string()))
    }
}

/// State of one node
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    /// Coarse health (`unknown`, `down`, `maintenance`, `slow`, `healthy`)
    pub health: String,

    /// Detailed upstream state code
    #[serde(default)]
    pub status: Option<String>,

    /// Next scheduled maintenance
    #[serde(default)]
    pub next_window: Option<MaintenanceWindow>,
}

/// A scheduled time window
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MaintenanceWindow {
    /// Start time (RFC 3339)
    pub start: String,

    /// End time (RFC 3339)
    pub end: String,

    /// State the service will be in during the window
    #[serde(default)]
    pub status: Option<String>,
}

/// Limited-time in-game contract
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElusiveTarget {
    /// Target name
    pub name: String,

    /// Tile image path
    #[serde(default)]
    pub tile: String,

    /// Briefing text
    #[serde(default)]
    pub description: String,

    /// Mission location
    #[serde(default)]
    pub location: String,

    /// Availability window
    #[serde(default)]
    pub next_window: Option<MaintenanceWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let doc = StatusDocument::parse(r#"{"services":{"pc-service.hitman.io":{"health":"down"}}}"#)
            .unwrap();
        assert_eq!(doc.services["pc-service.hitman.io"].health, "down");
        assert!(doc.elusives.is_empty());
        assert!(doc.timestamp.is_none());
    }

    #[test]
    fn test_parse_invalid() {
        let err = StatusDocument::parse("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidDocument(_)));
    }
}
