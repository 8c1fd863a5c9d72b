//! statusgrid.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{DEFAULT_GROUP, ServiceSpec};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_METRICS_PORT: u16 = 9743;
const DEFAULT_REFRESH: Duration = Duration::from_secs(30);
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_RANGE: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_STEP: Duration = Duration::from_secs(5 * 60);
const DEFAULT_TITLE: &str = "PromPage";
const DEFAULT_GRAPH_POINTS: u32 = 200;
const MIN_REFRESH: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Base URL of the Prometheus server.
    #[serde(default)]
    pub prometheus: String,
    #[serde(default)]
    pub port: u16,
    /// Poll interval.
    #[serde(default, with = "crate::duration")]
    pub refresh: Duration,
    /// Per-request timeout for backend queries.
    #[serde(default, with = "crate::duration")]
    pub query_timeout: Duration,
    /// How long an in-flight poll cycle may run after shutdown is signalled.
    #[serde(default, with = "crate::duration")]
    pub shutdown_grace: Duration,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    #[serde(default)]
    pub title: String,
    /// Refresh hint handed to clients of the status API.
    #[serde(default, with = "crate::duration")]
    pub refresh: Duration,
    #[serde(default)]
    pub graphs: GraphsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphsConfig {
    /// Fetch history with a range query on every poll.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of history samples kept per service.
    #[serde(default)]
    pub points: u32,
}

impl Default for GraphsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Read, default, and validate a configuration file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), services = config.services.len(), "config loaded");
        Ok(config)
    }

    /// Parse, default, and validate configuration text.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Replace every unset (zero or empty) field with its default.
    pub fn apply_defaults(&mut self) {
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.metrics.port == 0 {
            self.metrics.port = DEFAULT_METRICS_PORT;
        }
        if self.refresh.is_zero() {
            self.refresh = DEFAULT_REFRESH;
        }
        if self.query_timeout.is_zero() {
            self.query_timeout = DEFAULT_QUERY_TIMEOUT;
        }
        if self.shutdown_grace.is_zero() {
            self.shutdown_grace = DEFAULT_SHUTDOWN_GRACE;
        }

        for svc in &mut self.services {
            if svc.group.is_empty() {
                svc.group = DEFAULT_GROUP.to_string();
            }
            if svc.query.range.is_zero() {
                svc.query.range = DEFAULT_RANGE;
            }
            if svc.query.step.is_zero() {
                svc.query.step = DEFAULT_STEP;
            }
        }

        if self.ui.title.is_empty() {
            self.ui.title = DEFAULT_TITLE.to_string();
        }
        if self.ui.refresh.is_zero() {
            self.ui.refresh = DEFAULT_REFRESH;
        }
        if self.ui.graphs.points == 0 {
            self.ui.graphs.points = DEFAULT_GRAPH_POINTS;
        }
    }

    /// Check the invariants the rest of the system relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        let prometheus = self.prometheus.trim();
        if prometheus.is_empty() {
            return Err(ConfigError::Invalid("prometheus cannot be empty".into()));
        }
        if !(prometheus.starts_with("http://") || prometheus.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "prometheus must be an http:// or https:// URL, got {prometheus:?}"
            )));
        }
        if self.refresh < MIN_REFRESH {
            return Err(ConfigError::Invalid(format!(
                "refresh must be at least {}s",
                MIN_REFRESH.as_secs()
            )));
        }

        let mut seen = HashSet::new();
        for (index, svc) in self.services.iter().enumerate() {
            if svc.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "service #{index} has an empty name"
                )));
            }
            if !seen.insert(svc.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate service name {:?}",
                    svc.name
                )));
            }
            if svc.query.query.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "service {:?} has an empty query",
                    svc.name
                )));
            }
        }

        Ok(())
    }
}
