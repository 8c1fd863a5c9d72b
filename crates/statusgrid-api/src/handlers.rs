//! REST API handlers.
//!
//! Each handler reads one snapshot from the `ResultCache` and returns JSON.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::debug;

use statusgrid_collector::{
    Outage, ResultCache, ServiceGroup, StatusSnapshot, epoch_secs, render_prometheus,
};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Body of `GET /api/v1/status`.
#[derive(Serialize)]
struct StatusView<'a> {
    title: &'a str,
    version: &'static str,
    /// False until the first poll cycle completes.
    ready: bool,
    outage: Outage,
    age_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    captured_at: Option<u64>,
    refresh_ms: u64,
    total: usize,
    passing: usize,
    generation: u64,
    groups: &'a [ServiceGroup],
}

impl<'a> StatusView<'a> {
    fn new(state: &'a ApiState, snapshot: &'a StatusSnapshot) -> Self {
        Self {
            title: &state.title,
            version: env!("CARGO_PKG_VERSION"),
            ready: snapshot.is_ready(),
            outage: snapshot.outage,
            age_secs: snapshot.age.as_secs(),
            captured_at: snapshot.captured_at.map(epoch_secs),
            refresh_ms: state.refresh.as_millis() as u64,
            total: snapshot.results.len(),
            passing: snapshot.passing(),
            generation: snapshot.generation,
            groups: &snapshot.groups,
        }
    }
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.cache.snapshot().await;
    ApiResponse::ok(StatusView::new(&state, &snapshot)).into_response()
}

/// GET /api/v1/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    let (results, _) = state.cache.get().await;
    ApiResponse::ok(results).into_response()
}

/// GET /api/v1/services/:name
pub async fn get_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let (results, _) = state.cache.get().await;
    match results.iter().find(|r| r.name() == name) {
        Some(result) => ApiResponse::ok(result).into_response(),
        None => {
            debug!(%name, "service not found");
            error_response("service not found", StatusCode::NOT_FOUND).into_response()
        }
    }
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /metrics
pub async fn prometheus_metrics(State(cache): State<ResultCache>) -> impl IntoResponse {
    let snapshot = cache.snapshot().await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render_prometheus(&snapshot),
    )
}
