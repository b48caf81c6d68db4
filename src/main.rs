//! Incident Aggregation Service — Binary Entrypoint
//! Boots the Axum HTTP server: loads config (failing fast on contract
//! violations), builds one adapter per configured source, and wires the
//! long-lived aggregator into the router.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use conflict_event_aggregator::aggregator::EventAggregator;
use conflict_event_aggregator::api::{self, AppState};
use conflict_event_aggregator::event::SourceKind;
use conflict_event_aggregator::ingest::config::AggregatorConfig;
use conflict_event_aggregator::ingest::providers::{
    NewsRssProvider, SocialFeedProvider, StructuredApiProvider,
};
use conflict_event_aggregator::ingest::types::SourceAdapter;
use conflict_event_aggregator::metrics::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("conflict_event_aggregator=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn build_adapters(config: &AggregatorConfig) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for src in &config.sources {
        let url = src
            .url
            .clone()
            .ok_or_else(|| anyhow!("source '{}' has no url", src.name))?;
        let adapter: Arc<dyn SourceAdapter> = match src.kind {
            SourceKind::StructuredApi => Arc::new(StructuredApiProvider::from_url(url)),
            SourceKind::News => Arc::new(NewsRssProvider::from_url(url)),
            SourceKind::Social => Arc::new(SocialFeedProvider::from_url(url)),
            other => {
                return Err(anyhow!(
                    "source '{}' has kind {:?} with no adapter implementation",
                    src.name,
                    other
                ))
            }
        };
        adapters.push(adapter);
    }
    Ok(adapters)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AggregatorConfig::load_default().context("loading aggregator config")?;
    let adapters = build_adapters(&config)?;
    if adapters.is_empty() {
        tracing::warn!("no sources configured; the feed will stay empty");
    }

    let metrics = Metrics::init(config.cache_ttl_secs);
    let aggregator = Arc::new(EventAggregator::new(adapters, &config));

    let router = api::create_router(AppState { aggregator }).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "aggregator listening");

    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
