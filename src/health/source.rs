//! Upstream collaborators
//!
//! [`HealthSource`] yields the status document of the game backend,
//! [`EndpointProbe`] checks a single non-game endpoint. Both have HTTP
//! implementations built on `reqwest`.

use std::time::Duration;

use async_trait::async_trait;

use super::document::StatusDocument;
use crate::error::UpstreamError;
use crate::types::{EndpointState, HealthObservation};

/// Supplies the upstream status document for one polling cycle
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Fetch and parse the current document
    async fn fetch(&self) -> Result<StatusDocument, UpstreamError>;
}

/// Result of probing an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Endpoint answered successfully
    Up,
    /// Endpoint failed
    Down {
        /// HTTP status code, `None` on transport failure
        code: Option<u16>,
        /// Reason
        message: String,
    },
}

impl ProbeOutcome {
    /// Build the outcome for an upstream failure
    pub fn from_error(error: &UpstreamError) -> Self {
        ProbeOutcome::Down {
            code: error.status_code(),
            message: match error {
                UpstreamError::Status { message, .. } => message.clone(),
                other => other.to_string(),
            },
        }
    }

    /// Convert to an observation of the named endpoint
    pub fn to_observation(&self, name: &str) -> HealthObservation {
        match self {
            ProbeOutcome::Up => HealthObservation::endpoint(name, EndpointState::Up),
            ProbeOutcome::Down { code, message } => {
                let obs = HealthObservation::endpoint(name, EndpointState::Down)
                    .with_message(message.clone());
                match code {
                    Some(code) => obs.with_status_code(*code),
                    None => obs,
                }
            }
        }
    }
}

/// Checks one non-game endpoint
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// Endpoint name, used as the gate key
    fn name(&self) -> &str;

    /// Probe the endpoint once
    async fn probe(&self) -> ProbeOutcome;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("hitmanstat/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| UpstreamError::Transport(e.to_string()))
}

fn status_error(response: &reqwest::Response) -> UpstreamError {
    let status = response.status();
    UpstreamError::Status {
        code: status.as_u16(),
        message: status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string(),
    }
}

/// Fetches the status document over HTTP
#[derive(Debug, Clone)]
pub struct HttpHealthSource {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthSource {
    /// Create a source for `url` with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HealthSource for HttpHealthSource {
    async fn fetch(&self) -> Result<StatusDocument, UpstreamError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(&response));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if !is_json {
            return Err(UpstreamError::InvalidDocument(
                "response is not application/json".to_string(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        StatusDocument::parse(&body)
    }
}

/// Probes an endpoint with a GET request
#[derive(Debug, Clone)]
pub struct HttpEndpointProbe {
    name: String,
    client: reqwest::Client,
    url: String,
}

impl HttpEndpointProbe {
    /// Create a probe named `name` for `url`
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            name: name.into(),
            client: build_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EndpointProbe for HttpEndpointProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> ProbeOutcome {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => ProbeOutcome::Up,
            Ok(response) => ProbeOutcome::from_error(&status_error(&response)),
            Err(e) => ProbeOutcome::from_error(&UpstreamError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;

    #[test]
    fn test_outcome_from_status_error() {
        let outcome = ProbeOutcome::from_error(&UpstreamError::Status {
            code: 503,
            message: "Service Unavailable".to_string(),
        });
        let obs = outcome.to_observation("HITMAN FORUM");
        assert_eq!(obs.classification, Classification::Endpoint(EndpointState::Down));
        assert_eq!(obs.status_code, Some(503));
        assert_eq!(obs.message.as_deref(), Some("Service Unavailable"));
    }

    #[test]
    fn test_outcome_from_transport_error() {
        let outcome = ProbeOutcome::from_error(&UpstreamError::Transport("timed out".to_string()));
        let obs = outcome.to_observation("HITMAN AUTHENTICATION");
        assert_eq!(obs.status_code, None);
        assert_eq!(obs.message.as_deref(), Some("Request failed: timed out"));
    }

    #[test]
    fn test_up_observation() {
        let obs = ProbeOutcome::Up.to_observation("HITMAN FORUM");
        assert!(obs.classification.is_all_clear());
    }
}
