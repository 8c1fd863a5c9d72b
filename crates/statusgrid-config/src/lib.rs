//! statusgrid-config — configuration for the StatusGrid daemon.
//!
//! Parses the `statusgrid.toml` file into a [`Config`], fills in defaults
//! for anything left unset, and validates the result. Downstream crates
//! receive an already-defaulted, already-validated configuration and never
//! re-check it.
//!
//! # Layout
//!
//! ```text
//! Config
//!   ├── prometheus, port, refresh, query_timeout, shutdown_grace
//!   ├── MetricsConfig (separate /metrics listener)
//!   ├── UiConfig (title, client refresh hint, history points)
//!   └── services: Vec<ServiceSpec>   (configuration order is display order)
//!         └── QueryDefinition (query, expression, range, step, bool, units)
//! ```

pub mod config;
pub mod duration;
pub mod error;
pub mod expression;
pub mod types;

pub use config::{Config, GraphsConfig, MetricsConfig, UiConfig};
pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use expression::{Comparison, Expression};
pub use types::{DEFAULT_GROUP, QueryDefinition, ServiceSpec};
