//! statusgrid-query — talking to the metrics backend.
//!
//! The rest of StatusGrid only sees the [`MetricsClient`] capability: give it
//! a [`QueryDefinition`](statusgrid_config::QueryDefinition), get back a
//! number or a [`QueryError`]. [`PrometheusClient`] is the production
//! implementation, speaking the Prometheus HTTP API over hyper.
//!
//! Retries are intentionally absent. A failed query surfaces as a failed
//! service for one poll cycle and is naturally retried on the next.

pub mod client;
pub mod error;
pub mod prometheus;

pub use client::{MetricsClient, QueryFuture, Sample};
pub use error::QueryError;
pub use prometheus::PrometheusClient;
