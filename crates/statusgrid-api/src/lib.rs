//! statusgrid-api — HTTP surface for StatusGrid.
//!
//! Read-only axum routes over the [`ResultCache`]. Every request takes one
//! snapshot, so all fields of a response describe the same poll cycle.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/status` | Outage, age, and grouped results |
//! | GET | `/api/v1/services` | All results in configuration order |
//! | GET | `/api/v1/services/{name}` | One service's result |
//! | GET | `/healthz` | Liveness |
//! | GET | `/metrics` | Prometheus exposition ([`metrics_router`]) |

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::get;

use statusgrid_collector::ResultCache;
use statusgrid_config::Config;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub cache: ResultCache,
    pub title: String,
    /// Refresh hint passed to clients.
    pub refresh: Duration,
}

impl ApiState {
    pub fn new(cache: ResultCache, config: &Config) -> Self {
        Self {
            cache,
            title: config.ui.title.clone(),
            refresh: config.ui.refresh,
        }
    }
}

/// Build the status API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/services", get(handlers::list_services))
        .route("/services/{name}", get(handlers::get_service))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}

/// Build the router serving `/metrics`, mountable on its own listener.
pub fn metrics_router(cache: ResultCache) -> Router {
    Router::new().route("/metrics", get(handlers::prometheus_metrics).with_state(cache))
}
