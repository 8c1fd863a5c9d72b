//! Status API regression tests.
//!
//! Drives the real poller against an in-process metrics client and checks
//! what the HTTP surface reports before and after a poll cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use statusgrid_api::{ApiState, build_router, metrics_router};
use statusgrid_collector::{Evaluator, Poller, ResultCache};
use statusgrid_config::{Config, QueryDefinition};
use statusgrid_query::{MetricsClient, QueryError, QueryFuture, Sample};

/// Answers each query text with a fixed value; unknown queries fail.
struct StaticClient {
    values: HashMap<String, f64>,
}

impl MetricsClient for StaticClient {
    fn query<'a>(&'a self, query: &'a QueryDefinition) -> QueryFuture<'a, f64> {
        Box::pin(async move {
            self.values
                .get(&query.query)
                .copied()
                .ok_or_else(|| QueryError::Connect("connection refused".to_string()))
        })
    }

    fn query_range<'a>(
        &'a self,
        _query: &'a QueryDefinition,
        _end: SystemTime,
    ) -> QueryFuture<'a, Vec<Sample>> {
        Box::pin(async { Ok(vec![Sample { timestamp: 1.0, value: 1.0 }]) })
    }
}

const CONFIG: &str = r#"
prometheus = "http://prometheus:9090"

[ui]
title = "Acme Status"

[[services]]
name = "A"
group = "web"
[services.query]
query = "up_a"
bool = true

[[services]]
name = "B"
group = "web"
[services.query]
query = "up_b"
bool = true

[[services]]
name = "C"
[services.query]
query = "up_c"
bool = true

[[services]]
name = "D"
group = "db"
[services.query]
query = "up_d"
"#;

fn setup() -> (Config, Poller, ResultCache) {
    let config = Config::from_toml(CONFIG).unwrap();
    let client = StaticClient {
        values: HashMap::from([
            ("up_a".to_string(), 1.0),
            ("up_b".to_string(), 0.0),
            ("up_c".to_string(), 1.0),
        ]),
    };
    let cache = ResultCache::new();
    let poller = Poller::new(
        config.services.clone(),
        Evaluator::new(Arc::new(client)).with_history(10),
        cache.clone(),
        config.refresh,
    );
    (config, poller, cache)
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn status_before_first_poll_is_not_ready() {
    let (config, _poller, cache) = setup();
    let router = build_router(ApiState::new(cache, &config));

    let (status, body) = get_json(router, "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["ready"], false);
    assert_eq!(data["outage"], "None");
    assert_eq!(data["age_secs"], 0);
    assert!(data.get("captured_at").is_none());
    assert_eq!(data["groups"].as_array().unwrap().len(), 1);
    assert_eq!(data["groups"][0]["name"], "default");
}

#[tokio::test]
async fn status_after_poll_reports_partial_outage() {
    let (config, poller, cache) = setup();
    poller.poll_once().await;
    let router = build_router(ApiState::new(cache, &config));

    let (status, body) = get_json(router, "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["title"], "Acme Status");
    assert_eq!(data["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(data["ready"], true);
    assert_eq!(data["outage"], "Partial");
    assert_eq!(data["total"], 4);
    // A and C pass; B is zero, D's query fails.
    assert_eq!(data["passing"], 2);
    assert_eq!(data["refresh_ms"], 30_000);

    let groups = data["groups"].as_array().unwrap();
    let group_names: Vec<_> = groups.iter().map(|g| g["name"].as_str().unwrap()).collect();
    assert_eq!(group_names, ["default", "web", "db"]);

    let web: Vec<_> = groups[1]["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["service"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(web, ["A", "B"]);

    let d = &groups[2]["results"][0];
    assert_eq!(d["status"], false);
    assert!(d["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn services_are_listed_in_configuration_order() {
    let (config, poller, cache) = setup();
    poller.poll_once().await;
    let router = build_router(ApiState::new(cache, &config));

    let (status, body) = get_json(router, "/api/v1/services").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["service"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["A", "B", "C", "D"]);
    assert_eq!(body["data"][0]["series"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn get_single_service() {
    let (config, poller, cache) = setup();
    poller.poll_once().await;
    let router = build_router(ApiState::new(cache, &config));

    let (status, body) = get_json(router.clone(), "/api/v1/services/B").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], false);
    assert_eq!(body["data"]["value"], 0.0);

    let (status, body) = get_json(router, "/api/v1/services/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn healthz_is_ok() {
    let (config, _poller, cache) = setup();
    let router = build_router(ApiState::new(cache, &config));

    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_exposition() {
    let (_config, poller, cache) = setup();
    poller.poll_once().await;
    let router = metrics_router(cache);

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("statusgrid_service_up{service=\"A\",group=\"web\"} 1"));
    assert!(text.contains("statusgrid_service_up{service=\"B\",group=\"web\"} 0"));
    assert!(text.contains("statusgrid_ready 1"));
    assert!(text.contains("statusgrid_outage_level 1"));
    assert!(text.contains("statusgrid_services_total 4"));
}

#[tokio::test(start_paused = true)]
async fn background_poller_feeds_the_api() {
    let (config, poller, cache) = setup();
    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move { poller.run(rx).await });

    tokio::time::sleep(Duration::from_millis(10)).await;

    let router = build_router(ApiState::new(cache, &config));
    let (_, body) = get_json(router, "/api/v1/status").await;
    assert_eq!(body["data"]["ready"], true);
    assert_eq!(body["data"]["generation"], 1);

    tx.send(true).unwrap();
    handle.await.unwrap();
}
