//! Server configuration
//!
//! Read from:
//! 1. the TOML file named by `HITMANSTAT_CONFIG`
//! 2. `./hitmanstat.toml`
//! 3. built-in defaults
//!
//! Every field has a default, so a partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::gate::GateConfig;

/// Longest report chart window, one week
pub const MAX_CHART_HOURS: u32 = 168;

/// Environment variable holding the configuration file path
pub const CONFIG_ENV: &str = "HITMANSTAT_CONFIG";

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "hitmanstat.toml";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP server address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Upstream polling
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Debounce gate tuning
    #[serde(default)]
    pub gate: GateConfig,

    /// User reports
    #[serde(default)]
    pub reports: ReportsConfig,
}

/// Upstream endpoints and polling cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Game services status document
    pub status_url: String,

    /// Forum endpoint probed for availability
    pub forum_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Status document poll interval in seconds
    pub status_interval_secs: u64,

    /// Forum probe interval in seconds
    pub forum_interval_secs: u64,

    /// Expired cache entry sweep interval in seconds
    pub cache_sweep_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            status_url: "https://auth.hitman.io/status".to_string(),
            forum_url: "https://www.hitmanforum.com/".to_string(),
            timeout_secs: 15,
            status_interval_secs: 60,
            forum_interval_secs: 120,
            cache_sweep_secs: 300,
        }
    }
}

impl UpstreamConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Status document poll interval
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    /// Forum probe interval
    pub fn forum_interval(&self) -> Duration {
        Duration::from_secs(self.forum_interval_secs)
    }

    /// Cache sweep interval
    pub fn cache_sweep(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_secs)
    }
}

/// User report settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Minutes before a fingerprint may report the same service again
    pub cooldown_minutes: u64,

    /// Hours covered by the report chart
    pub chart_hours: u32,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 30,
            chart_hours: 24,
        }
    }
}

impl ReportsConfig {
    /// Per-fingerprint cooldown
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes * 60)
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/hitmanstat.db")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_path: default_database_path(),
            upstream: UpstreamConfig::default(),
            gate: GateConfig::default(),
            reports: ReportsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.gate.lockout_unit.is_zero() {
            return Err(Error::Configuration(
                "gate.lockout_unit must be greater than zero".to_string(),
            ));
        }
        if self.gate.escalation_multiplier == 0 {
            return Err(Error::Configuration(
                "gate.escalation_multiplier must be greater than zero".to_string(),
            ));
        }
        let upstream = &self.upstream;
        if upstream.status_interval_secs == 0
            || upstream.forum_interval_secs == 0
            || upstream.cache_sweep_secs == 0
        {
            return Err(Error::Configuration(
                "poll and sweep intervals must be greater than zero".to_string(),
            ));
        }
        if !(1..=MAX_CHART_HOURS).contains(&self.reports.chart_hours) {
            return Err(Error::Configuration(format!(
                "reports.chart_hours must be between 1 and {MAX_CHART_HOURS}"
            )));
        }
        Ok(())
    }
}

/// Load configuration from the environment, the working directory or defaults.
///
/// An unreadable or invalid file is logged and the next source is tried.
pub fn load_config() -> AppConfig {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        match AppConfig::from_file(Path::new(&path)) {
            Ok(config) => {
                tracing::info!(path = %path, "Loaded configuration from file");
                return config;
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to load config file, using defaults");
            }
        }
    }

    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.exists() {
        match AppConfig::from_file(local) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", DEFAULT_CONFIG_FILE);
                return config;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid {}", DEFAULT_CONFIG_FILE);
            }
        }
    }

    tracing::info!("Using default configuration");
    AppConfig::default()
}
