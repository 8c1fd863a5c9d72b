//! Per-service evaluation results.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};
use thiserror::Error;

use statusgrid_config::ServiceSpec;
use statusgrid_query::{QueryError, Sample};

/// Why a service could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("evaluation task failed: {0}")]
    Task(String),
}

/// The outcome of evaluating one service in one poll cycle.
///
/// Immutable once built; superseded wholesale by the next cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceResult {
    pub service: Arc<ServiceSpec>,
    /// `true` means healthy. Always `false` when `error` is set.
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<EvalError>,
    /// Recent history from the range query, oldest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Sample>,
    #[serde(rename = "timestamp", serialize_with = "serialize_epoch")]
    pub evaluated_at: SystemTime,
}

impl ServiceResult {
    /// A successful evaluation.
    pub fn evaluated(service: Arc<ServiceSpec>, status: bool, value: f64, at: SystemTime) -> Self {
        Self {
            service,
            status,
            value: Some(value),
            error: None,
            series: Vec::new(),
            evaluated_at: at,
        }
    }

    /// A failed evaluation: unhealthy, no value.
    pub fn failed(service: Arc<ServiceSpec>, error: EvalError, at: SystemTime) -> Self {
        Self {
            service,
            status: false,
            value: None,
            error: Some(error),
            series: Vec::new(),
            evaluated_at: at,
        }
    }

    pub fn name(&self) -> &str {
        &self.service.name
    }

    pub fn group_name(&self) -> &str {
        self.service.group_name()
    }
}

/// Seconds since the Unix epoch, zero for pre-epoch times.
pub fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn serialize_epoch<S: Serializer>(t: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(epoch_secs(*t))
}

fn serialize_error<S: Serializer>(e: &Option<EvalError>, serializer: S) -> Result<S::Ok, S::Error> {
    match e {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}
