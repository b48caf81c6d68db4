// tests/aggregator_cache.rs
//! Cache behavior of the aggregator: idempotent reads within the TTL window,
//! absolute TTL expiry, and administrative reset.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use conflict_event_aggregator::{
    AggregatorConfig, EventAggregator, RawRecord, RetryPolicy, SourceAdapter, SourceKind,
};

struct CountingSource {
    records: Vec<RawRecord>,
    calls: AtomicUsize,
}

#[async_trait]
impl SourceAdapter for CountingSource {
    async fn fetch_recent(&self) -> Result<Vec<RawRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
    fn name(&self) -> &'static str {
        "counting"
    }
    fn kind(&self) -> SourceKind {
        SourceKind::StructuredApi
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn rec(country: &str, ts: u64, category: &str) -> RawRecord {
    RawRecord {
        country: Some(country.to_string()),
        event_time: Some(ts.to_string()),
        category: Some(category.to_string()),
        ..RawRecord::default()
    }
}

fn test_config(ttl_secs: u64) -> AggregatorConfig {
    AggregatorConfig {
        cache_ttl_secs: ttl_secs,
        retry: RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_jitter_ms: 0,
            attempt_timeout_secs: 5,
        },
        ..AggregatorConfig::default()
    }
}

fn build(ttl_secs: u64, records: Vec<RawRecord>) -> (Arc<CountingSource>, EventAggregator) {
    let source = Arc::new(CountingSource {
        records,
        calls: AtomicUsize::new(0),
    });
    let adapters = vec![source.clone() as Arc<dyn SourceAdapter>];
    let agg = EventAggregator::new(adapters, &test_config(ttl_secs));
    (source, agg)
}

#[tokio::test]
async fn second_read_within_ttl_is_served_from_cache() {
    let now = now_unix();
    let (source, agg) = build(
        300,
        vec![rec("Ukraine", now - 100, "battle"), rec("Sudan", now - 200, "battle")],
    );

    let first = agg.get_all_events(false).await;
    let second = agg.get_all_events(false).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 1, "no extra source calls");
    assert_eq!(first.events, second.events);
    assert_eq!(first.fetched_at, second.fetched_at);
    assert!(!second.stale);
    assert_eq!(first.events.len(), 2);
}

#[tokio::test]
async fn forced_refresh_bypasses_fresh_cache() {
    let now = now_unix();
    let (source, agg) = build(300, vec![rec("Ukraine", now - 100, "battle")]);

    agg.get_all_events(false).await;
    agg.get_all_events(true).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn expired_entry_triggers_a_new_fetch() {
    let now = now_unix();
    let (source, agg) = build(1, vec![rec("Ukraine", now - 100, "battle")]);

    agg.get_all_events(false).await;
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    let snap = agg.get_all_events(false).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert!(!snap.stale);
}

#[tokio::test]
async fn clear_cache_drops_entries_and_forces_refetch() {
    let now = now_unix();
    let (source, agg) = build(300, vec![rec("Ukraine", now - 100, "battle")]);

    agg.get_all_events(false).await;
    agg.clear_cache().await;
    agg.get_all_events(false).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}
