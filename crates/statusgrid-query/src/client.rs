//! The metrics client capability.

use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use statusgrid_config::QueryDefinition;

use crate::error::QueryError;

/// Boxed future returned by [`MetricsClient`] methods.
pub type QueryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueryError>> + Send + 'a>>;

/// One point of a range query result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in seconds.
    pub timestamp: f64,
    pub value: f64,
}

/// Executes health queries against a metrics backend.
///
/// Injected into the evaluator so tests can substitute canned or delayed
/// responses. Implementations own their own timeouts.
pub trait MetricsClient: Send + Sync {
    /// Instant query: the current value of the query.
    fn query<'a>(&'a self, query: &'a QueryDefinition) -> QueryFuture<'a, f64>;

    /// Range query over `[end - query.range, end]` at `query.step`.
    fn query_range<'a>(
        &'a self,
        query: &'a QueryDefinition,
        end: SystemTime,
    ) -> QueryFuture<'a, Vec<Sample>>;
}
