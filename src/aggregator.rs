//! # Event Aggregator
//! Long-lived service object coordinating the whole fetch→merge cycle:
//! cache-first reads, single-flight refreshes per cache key, one concurrent
//! retried task per enabled source, settle-all collection, and degradation
//! to stale or empty output when upstreams fail. Constructed once at process
//! start and shared by reference; all state is process memory.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, histogram};
use serde::Serialize;

use crate::cache::TtlCache;
use crate::dashboard::{self, DashboardMetrics};
use crate::event::{Event, Severity};
use crate::ingest::config::AggregatorConfig;
use crate::ingest::dedup::DedupPolicy;
use crate::ingest::types::SourceAdapter;
use crate::ingest::{self, run_pipeline};
use crate::retry::{self, RetryPolicy, SourceStatus, StatusRegistry};

const FEED_KEY: &str = "feed:all";
const CRITICAL_KEY: &str = "feed:critical";

/// One consistent view of the merged feed. `stale` is set when an expired
/// cache entry was served because every source failed on refresh.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub events: Vec<Event>,
    pub stale: bool,
    pub fetched_at: u64,
}

impl FeedSnapshot {
    fn empty(now: u64) -> Self {
        Self {
            events: Vec::new(),
            stale: false,
            fetched_at: now,
        }
    }
}

pub struct EventAggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    retry_policy: RetryPolicy,
    dedup_policy: DedupPolicy,
    /// 0 = never auto-skip a source on consecutive errors.
    disable_after_errors: u32,
    cache: TtlCache,
    statuses: StatusRegistry,
    /// Per-cache-key refresh guards: concurrent callers for the same key
    /// share one in-flight refresh; different keys refresh in parallel.
    refresh_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Monotonic completion marks per key, so a caller that waited on the
    /// key lock can tell a refresh settled while it waited.
    refresh_marks: std::sync::Mutex<HashMap<String, std::time::Instant>>,
}

impl EventAggregator {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, config: &AggregatorConfig) -> Self {
        ingest::ensure_metrics_described();

        let statuses = retry::new_registry();
        {
            let mut map = statuses.write().expect("status registry poisoned");
            for adapter in &adapters {
                let enabled = config.source_enabled(adapter.name());
                map.insert(
                    adapter.name().to_string(),
                    SourceStatus::new(adapter.name(), adapter.kind(), enabled),
                );
            }
        }

        Self {
            adapters,
            retry_policy: config.retry,
            dedup_policy: config.dedup,
            disable_after_errors: config.disable_after_errors,
            cache: TtlCache::new(config.cache_ttl_secs),
            statuses,
            refresh_locks: tokio::sync::Mutex::new(HashMap::new()),
            refresh_marks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// The primary operation: return the merged, ordered feed.
    ///
    /// Fresh cache + `!force_refresh` short-circuits with no network
    /// activity. Otherwise at most one refresh per key runs at a time;
    /// late arrivals observe the result the in-flight refresh produced.
    pub async fn get_all_events(&self, force_refresh: bool) -> FeedSnapshot {
        let now = now_unix();

        if !force_refresh {
            if let Some(entry) = self.cache.get_fresh(FEED_KEY, now) {
                counter!("aggregate_cache_hits_total").increment(1);
                return FeedSnapshot {
                    events: entry.events,
                    stale: false,
                    fetched_at: entry.fetched_at,
                };
            }
        }
        counter!("aggregate_cache_miss_total").increment(1);

        let waited_from = std::time::Instant::now();
        let key_lock = self.lock_for(FEED_KEY).await;
        let _guard = key_lock.lock().await;
        let now = now_unix();

        // A refresh that settled while we waited on the key lock is our
        // result too: return what it produced instead of fetching again.
        if self.refreshed_since(FEED_KEY, waited_from) {
            return match self.cache.peek(FEED_KEY, now) {
                Some((entry, stale)) => FeedSnapshot {
                    events: entry.events,
                    stale,
                    fetched_at: entry.fetched_at,
                },
                None => FeedSnapshot::empty(now),
            };
        }

        if !force_refresh {
            if let Some(entry) = self.cache.get_fresh(FEED_KEY, now) {
                return FeedSnapshot {
                    events: entry.events,
                    stale: false,
                    fetched_at: entry.fetched_at,
                };
            }
        }

        self.refresh_feed().await
    }

    /// One full aggregation pass. Caller must hold the key's refresh lock.
    async fn refresh_feed(&self) -> FeedSnapshot {
        let started = std::time::Instant::now();
        let now = now_unix();

        let mut handles = Vec::new();
        for adapter in &self.adapters {
            if !self.source_callable(adapter.name()) {
                continue;
            }
            let adapter = Arc::clone(adapter);
            let statuses = Arc::clone(&self.statuses);
            let policy = self.retry_policy;
            handles.push(tokio::spawn(async move {
                let kind = adapter.kind();
                retry::fetch_with_retry(adapter.as_ref(), &policy, &statuses, now)
                    .await
                    .map(|records| (kind, records))
            }));
        }

        // Settle-all: individual failures (including panicked tasks) only
        // cost that source's contribution.
        let mut batches = Vec::new();
        let mut contributing = 0usize;
        for handle in handles {
            match handle.await {
                Ok(Some((kind, records))) => {
                    contributing += 1;
                    batches.push((kind, records));
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = ?e, "source task join error"),
            }
        }

        if contributing == 0 {
            self.mark_refreshed(FEED_KEY);
            // Total outage: serve the prior entry if one exists, empty
            // otherwise. The staleness flag tracks the entry's TTL state so
            // it agrees with what concurrent waiters on the key lock see.
            if let Some((entry, stale)) = self.cache.peek(FEED_KEY, now) {
                if stale {
                    counter!("aggregate_stale_serves_total").increment(1);
                }
                tracing::warn!(stale, "all sources failed, serving prior cache entry");
                return FeedSnapshot {
                    events: entry.events,
                    stale,
                    fetched_at: entry.fetched_at,
                };
            }
            tracing::warn!("all sources failed and cache is empty, returning no data");
            return FeedSnapshot::empty(now);
        }

        let (events, stats) = run_pipeline(now, batches, &self.dedup_policy);
        tracing::info!(
            received = stats.received,
            rejected = stats.rejected,
            deduped = stats.deduped,
            kept = stats.kept,
            sources = contributing,
            "aggregation pass complete"
        );

        self.cache.insert(FEED_KEY, events.clone(), now, contributing);
        self.mark_refreshed(FEED_KEY);
        histogram!("aggregate_pass_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        FeedSnapshot {
            events,
            stale: false,
            fetched_at: now,
        }
    }

    /// High/Critical subset, cached under its own key so dashboard polls
    /// don't re-filter. Never fetches beyond what the main feed does.
    pub async fn get_critical_events(&self) -> FeedSnapshot {
        let now = now_unix();
        if let Some(entry) = self.cache.get_fresh(CRITICAL_KEY, now) {
            return FeedSnapshot {
                events: entry.events,
                stale: false,
                fetched_at: entry.fetched_at,
            };
        }

        let feed = self.get_all_events(false).await;
        let critical: Vec<Event> = feed
            .events
            .iter()
            .filter(|e| e.severity >= Severity::High)
            .cloned()
            .collect();
        if !feed.stale {
            self.cache
                .insert(CRITICAL_KEY, critical.clone(), feed.fetched_at, 0);
        }
        FeedSnapshot {
            events: critical,
            stale: feed.stale,
            fetched_at: feed.fetched_at,
        }
    }

    /// Case-insensitive substring match on location and tags.
    pub async fn get_events_by_location(&self, query: &str) -> Vec<Event> {
        let q = query.trim().to_ascii_lowercase();
        if q.is_empty() {
            return Vec::new();
        }
        self.get_all_events(false)
            .await
            .events
            .into_iter()
            .filter(|e| {
                e.location.to_ascii_lowercase().contains(&q)
                    || e.tags.iter().any(|t| t.to_ascii_lowercase().contains(&q))
            })
            .collect()
    }

    pub async fn get_events_by_severity(&self, tier: Severity) -> Vec<Event> {
        self.get_all_events(false)
            .await
            .events
            .into_iter()
            .filter(|e| e.severity == tier)
            .collect()
    }

    pub async fn get_dashboard_metrics(&self) -> DashboardMetrics {
        let feed = self.get_all_events(false).await;
        dashboard::calculate(&feed.events, now_unix())
    }

    /// Per-source health snapshot, ordered by name for stable output.
    pub fn source_status(&self) -> Vec<SourceStatus> {
        let map = self.statuses.read().expect("status registry poisoned");
        let mut out: Vec<SourceStatus> = map.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Administrative reset: drops all cache entries and in-flight trackers.
    pub async fn clear_cache(&self) {
        self.cache.clear();
        self.refresh_locks.lock().await.clear();
        self.refresh_marks
            .lock()
            .expect("refresh marks poisoned")
            .clear();
    }

    fn mark_refreshed(&self, key: &str) {
        self.refresh_marks
            .lock()
            .expect("refresh marks poisoned")
            .insert(key.to_string(), std::time::Instant::now());
    }

    fn refreshed_since(&self, key: &str, waited_from: std::time::Instant) -> bool {
        self.refresh_marks
            .lock()
            .expect("refresh marks poisoned")
            .get(key)
            .is_some_and(|t| *t > waited_from)
    }

    fn source_callable(&self, name: &str) -> bool {
        let map = self.statuses.read().expect("status registry poisoned");
        match map.get(name) {
            Some(st) => {
                st.enabled
                    && (self.disable_after_errors == 0
                        || st.consecutive_errors < self.disable_after_errors)
            }
            None => false,
        }
    }

    async fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

fn now_unix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
