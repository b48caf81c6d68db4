//! HTTP surface over the aggregator. Thin by design: every handler is a
//! direct delegation to `EventAggregator`, and callers always get a list
//! (possibly empty) or a metrics object (possibly all-zero) — degraded
//! states render without exception special-casing.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregator::{EventAggregator, FeedSnapshot};
use crate::dashboard::DashboardMetrics;
use crate::event::{Event, Severity};
use crate::retry::SourceStatus;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<EventAggregator>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/events", get(events))
        .route("/events/critical", get(critical_events))
        .route("/events/by-location", get(events_by_location))
        .route("/events/by-severity", get(events_by_severity))
        .route("/dashboard", get(dashboard_metrics))
        .route("/sources", get(sources))
        .route("/admin/clear-cache", post(clear_cache))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize, Default)]
struct EventsQuery {
    #[serde(default)]
    refresh: bool,
}

#[derive(serde::Serialize)]
struct FeedResponse {
    stale: bool,
    fetched_at: u64,
    count: usize,
    events: Vec<Event>,
}

impl From<FeedSnapshot> for FeedResponse {
    fn from(snap: FeedSnapshot) -> Self {
        Self {
            stale: snap.stale,
            fetched_at: snap.fetched_at,
            count: snap.events.len(),
            events: snap.events,
        }
    }
}

async fn events(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> Json<FeedResponse> {
    let snap = state.aggregator.get_all_events(q.refresh).await;
    Json(snap.into())
}

async fn critical_events(State(state): State<AppState>) -> Json<FeedResponse> {
    let snap = state.aggregator.get_critical_events().await;
    Json(snap.into())
}

#[derive(serde::Deserialize)]
struct LocationQuery {
    q: String,
}

async fn events_by_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Json<Vec<Event>> {
    Json(state.aggregator.get_events_by_location(&query.q).await)
}

#[derive(serde::Deserialize)]
struct SeverityQuery {
    tier: String,
}

async fn events_by_severity(
    State(state): State<AppState>,
    Query(query): Query<SeverityQuery>,
) -> Result<Json<Vec<Event>>, (StatusCode, String)> {
    let tier: Severity = query
        .tier
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;
    Ok(Json(state.aggregator.get_events_by_severity(tier).await))
}

async fn dashboard_metrics(State(state): State<AppState>) -> Json<DashboardMetrics> {
    Json(state.aggregator.get_dashboard_metrics().await)
}

async fn sources(State(state): State<AppState>) -> Json<Vec<SourceStatus>> {
    Json(state.aggregator.source_status())
}

async fn clear_cache(State(state): State<AppState>) -> &'static str {
    state.aggregator.clear_cache().await;
    "cache cleared"
}
