// tests/api_http.rs
//! Drive the router in-process (no sockets) and check the HTTP contract.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::{Request, StatusCode};
use tower::ServiceExt; // for oneshot

use conflict_event_aggregator::api::{create_router, AppState};
use conflict_event_aggregator::{
    AggregatorConfig, EventAggregator, RawRecord, RetryPolicy, SourceAdapter, SourceKind,
};

struct StaticSource;

#[async_trait]
impl SourceAdapter for StaticSource {
    async fn fetch_recent(&self) -> Result<Vec<RawRecord>> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(vec![
            RawRecord {
                id: Some("api-1".into()),
                country: Some("Ukraine".into()),
                event_time: Some((now - 100).to_string()),
                category: Some("airstrike".into()),
                fatalities: Some(30),
                ..RawRecord::default()
            },
            RawRecord {
                id: Some("api-2".into()),
                country: Some("Georgia".into()),
                event_time: Some((now - 200).to_string()),
                category: Some("protest".into()),
                ..RawRecord::default()
            },
        ])
    }
    fn name(&self) -> &'static str {
        "static"
    }
    fn kind(&self) -> SourceKind {
        SourceKind::StructuredApi
    }
}

fn build_app() -> Router {
    let config = AggregatorConfig {
        cache_ttl_secs: 300,
        retry: RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_jitter_ms: 0,
            attempt_timeout_secs: 5,
        },
        ..AggregatorConfig::default()
    };
    let aggregator = Arc::new(EventAggregator::new(
        vec![Arc::new(StaticSource) as Arc<dyn SourceAdapter>],
        &config,
    ));
    create_router(AppState { aggregator })
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .expect("router response");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let app = build_app();
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn events_endpoint_returns_ordered_feed() {
    let app = build_app();
    let (status, body) = get_json(&app, "/events?refresh=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["stale"], false);
    assert_eq!(body["events"][0]["id"], "api-1");
    assert_eq!(body["events"][0]["severity"], "critical");
}

#[tokio::test]
async fn severity_filter_validates_the_tier() {
    let app = build_app();

    let (status, _) = get_json(&app, "/events/by-severity?tier=low").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(&app, "/events/by-severity?tier=apocalyptic").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_and_sources_render() {
    let app = build_app();

    let (status, body) = get_json(&app, "/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events_today"], 2);
    assert!(body["global_threat_level"].is_string());
    assert!(body["percentage_changes"]["events"].is_number());

    let (status, body) = get_json(&app, "/sources").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "static");
    assert_eq!(body[0]["consecutive_errors"], 0);
}

#[tokio::test]
async fn clear_cache_is_exposed_as_post() {
    let app = build_app();
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/clear-cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // GET on the admin route is not allowed.
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/admin/clear-cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}
