//! API Request/Response Types

use serde::{Deserialize, Serialize};

use hitmanstat::types::EndpointState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: Vec<ServiceHealthEntry>,
}

/// Background service state in the health response
#[derive(Debug, Serialize)]
pub struct ServiceHealthEntry {
    pub name: &'static str,
    pub status: String,
}

/// Endpoint state response, e.g. the forum
#[derive(Debug, Serialize)]
pub struct EndpointResponse {
    pub state: EndpointState,
    pub status: String,
    pub last_check: i64,
}

/// Recent events query parameters
#[derive(Debug, Deserialize)]
pub struct EventsParams {
    /// Maximum events to return (default: 50)
    #[serde(default = "default_events_limit")]
    pub limit: usize,
}

fn default_events_limit() -> usize {
    50
}

/// Upper bound for `EventsParams::limit`
pub const MAX_EVENTS_LIMIT: usize = 500;

/// Report submission body
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub reference: String,
    #[serde(default)]
    pub fingerprint: String,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
