//! Service evaluation.
//!
//! Runs one service's query through a [`MetricsClient`] and turns the
//! outcome into a [`ServiceResult`]. Failures are captured in the result,
//! never returned, so one bad service cannot disturb the rest of a cycle.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

use statusgrid_config::{QueryDefinition, ServiceSpec};
use statusgrid_query::{MetricsClient, Sample};

use crate::types::ServiceResult;

/// Decide health from a query's numeric result.
///
/// 1. A configured expression decides.
/// 2. Otherwise boolean queries are healthy when non-zero (NaN is not).
/// 3. Otherwise any value at all is healthy.
pub fn interpret(query: &QueryDefinition, value: f64) -> bool {
    if let Some(expr) = &query.expression {
        expr.evaluate(value)
    } else if query.bool_value {
        value != 0.0 && !value.is_nan()
    } else {
        true
    }
}

/// Evaluate one service's instant query.
pub async fn evaluate(service: Arc<ServiceSpec>, client: &dyn MetricsClient) -> ServiceResult {
    let at = SystemTime::now();

    match client.query(&service.query).await {
        Ok(value) => {
            let status = interpret(&service.query, value);
            debug!(service = %service.name, value, status, "service evaluated");
            ServiceResult::evaluated(service, status, value, at)
        }
        Err(e) => {
            warn!(service = %service.name, error = %e, "service query failed");
            ServiceResult::failed(service, e.into(), at)
        }
    }
}

/// Evaluates services against a shared client, optionally fetching history.
#[derive(Clone)]
pub struct Evaluator {
    client: Arc<dyn MetricsClient>,
    /// Keep at most this many history samples; `None` skips the range query.
    history_points: Option<usize>,
}

impl Evaluator {
    pub fn new(client: Arc<dyn MetricsClient>) -> Self {
        Self {
            client,
            history_points: None,
        }
    }

    /// Also run the range query and keep the latest `points` samples.
    pub fn with_history(mut self, points: usize) -> Self {
        self.history_points = Some(points);
        self
    }

    pub async fn evaluate(&self, service: Arc<ServiceSpec>) -> ServiceResult {
        let Some(points) = self.history_points else {
            return evaluate(service, self.client.as_ref()).await;
        };

        let (mut result, series) = tokio::join!(
            evaluate(Arc::clone(&service), self.client.as_ref()),
            self.history(&service, points),
        );
        result.series = series;
        result
    }

    async fn history(&self, service: &ServiceSpec, points: usize) -> Vec<Sample> {
        match self
            .client
            .query_range(&service.query, SystemTime::now())
            .await
        {
            Ok(mut series) => {
                if series.len() > points {
                    series.drain(..series.len() - points);
                }
                series
            }
            Err(e) => {
                debug!(service = %service.name, error = %e, "history query failed");
                Vec::new()
            }
        }
    }
}
