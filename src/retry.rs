//! # Retry Executor
//! Wraps a single adapter call with bounded retries, exponential backoff
//! with jitter, and a hard per-attempt timeout. Exhausting retries yields
//! `None` — "this source contributed nothing this pass" — never an error
//! the coordinator has to unwrap. Each execution also updates the shared
//! `SourceStatus` registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use rand::Rng;
use serde::Serialize;

use crate::event::SourceKind;
use crate::ingest::types::{RawRecord, SourceAdapter};

#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_jitter_ms() -> u64 {
    250
}
fn default_attempt_timeout_secs() -> u64 {
    15
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

impl RetryPolicy {
    fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// `base * 2^attempt + jitter`; the jitter breaks up synchronized retry
    /// storms across sources.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter = if self.max_jitter_ms > 0 {
            rand::rng().random_range(0..=self.max_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }
}

/// Operational health of one adapter. Created at startup from config,
/// mutated after every fetch attempt, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub kind: SourceKind,
    pub enabled: bool,
    /// Unix seconds of the last attempt (success or failure); 0 = never.
    pub last_fetch: u64,
    pub consecutive_errors: u32,
    pub last_record_count: usize,
}

impl SourceStatus {
    pub fn new(name: impl Into<String>, kind: SourceKind, enabled: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled,
            last_fetch: 0,
            consecutive_errors: 0,
            last_record_count: 0,
        }
    }
}

/// Shared health map. Lock is held only for map reads/writes, never across
/// an await.
pub type StatusRegistry = Arc<RwLock<HashMap<String, SourceStatus>>>;

pub fn new_registry() -> StatusRegistry {
    Arc::new(RwLock::new(HashMap::new()))
}

fn mark_failure(statuses: &StatusRegistry, name: &str, now: u64) {
    let mut map = statuses.write().expect("status registry poisoned");
    if let Some(st) = map.get_mut(name) {
        st.last_fetch = now;
        st.consecutive_errors = st.consecutive_errors.saturating_add(1);
    }
}

fn mark_success(statuses: &StatusRegistry, name: &str, now: u64, count: usize) {
    let mut map = statuses.write().expect("status registry poisoned");
    if let Some(st) = map.get_mut(name) {
        st.last_fetch = now;
        st.consecutive_errors = 0;
        st.last_record_count = count;
    }
}

/// Attempt the adapter up to `max_retries` times. A timed-out attempt counts
/// as a plain failure. Runs inside a per-source task, so backoff sleeps
/// never block sibling sources.
pub async fn fetch_with_retry(
    adapter: &dyn SourceAdapter,
    policy: &RetryPolicy,
    statuses: &StatusRegistry,
    now: u64,
) -> Option<Vec<RawRecord>> {
    for attempt in 0..policy.max_retries {
        let result = tokio::time::timeout(policy.attempt_timeout(), adapter.fetch_recent()).await;

        match result {
            Ok(Ok(records)) => {
                mark_success(statuses, adapter.name(), now, records.len());
                return Some(records);
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    source = adapter.name(),
                    attempt,
                    error = ?e,
                    "source fetch failed"
                );
            }
            Err(_) => {
                tracing::warn!(source = adapter.name(), attempt, "source fetch timed out");
            }
        }

        counter!("aggregate_source_errors_total").increment(1);
        mark_failure(statuses, adapter.name(), now);

        if attempt + 1 < policy.max_retries {
            tokio::time::sleep(policy.backoff(attempt)).await;
        }
    }

    tracing::warn!(
        source = adapter.name(),
        retries = policy.max_retries,
        "source exhausted retries, contributing zero records this pass"
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyAdapter {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for FlakyAdapter {
        async fn fetch_recent(&self) -> Result<Vec<RawRecord>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(vec![RawRecord::default(), RawRecord::default()])
            } else {
                Err(anyhow!("upstream 503"))
            }
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn kind(&self) -> SourceKind {
            SourceKind::News
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay_ms: 1,
            max_jitter_ms: 0,
            attempt_timeout_secs: 5,
        }
    }

    fn registry_with(name: &str) -> StatusRegistry {
        let reg = new_registry();
        reg.write()
            .unwrap()
            .insert(name.into(), SourceStatus::new(name, SourceKind::News, true));
        reg
    }

    #[tokio::test]
    async fn success_after_one_failure_resets_error_count() {
        let adapter = FlakyAdapter {
            calls: AtomicU32::new(0),
            succeed_on: 2,
        };
        let reg = registry_with("flaky");
        let out = fetch_with_retry(&adapter, &fast_policy(), &reg, 1_000).await;
        assert_eq!(out.unwrap().len(), 2);

        let map = reg.read().unwrap();
        let st = &map["flaky"];
        assert_eq!(st.consecutive_errors, 0);
        assert_eq!(st.last_record_count, 2);
        assert_eq!(st.last_fetch, 1_000);
    }

    #[tokio::test]
    async fn exhausted_retries_return_none_and_count_each_attempt() {
        let adapter = FlakyAdapter {
            calls: AtomicU32::new(0),
            succeed_on: 100,
        };
        let reg = registry_with("flaky");
        let out = fetch_with_retry(&adapter, &fast_policy(), &reg, 1_000).await;
        assert!(out.is_none());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);

        let map = reg.read().unwrap();
        assert_eq!(map["flaky"].consecutive_errors, 3);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let p = RetryPolicy {
            max_retries: 3,
            base_delay_ms: 100,
            max_jitter_ms: 0,
            attempt_timeout_secs: 5,
        };
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(2), Duration::from_millis(400));
    }
}
