//! # TTL Cache
//! In-memory key → (payload, fetch time) store with absolute TTL, no sliding
//! refresh. Entries are overwritten whole on refresh, never partially
//! updated. An expired entry is deliberately kept around so the coordinator
//! can stale-serve it when every source fails.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::event::Event;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub events: Vec<Event>,
    /// Unix seconds when the aggregation pass that produced this entry ran.
    pub fetched_at: u64,
    /// How many sources contributed records to this entry.
    pub source_count: usize,
}

#[derive(Debug)]
pub struct TtlCache {
    ttl_secs: u64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.fetched_at) < self.ttl_secs
    }

    /// Return the entry only while it is within TTL.
    pub fn get_fresh(&self, key: &str, now: u64) -> Option<CacheEntry> {
        let map = self.entries.lock().expect("cache mutex poisoned");
        map.get(key)
            .filter(|e| self.is_fresh(e, now))
            .cloned()
    }

    /// Return the entry regardless of TTL (stale-serve path). The second
    /// element says whether it is stale at `now`.
    pub fn peek(&self, key: &str, now: u64) -> Option<(CacheEntry, bool)> {
        let map = self.entries.lock().expect("cache mutex poisoned");
        map.get(key)
            .map(|e| (e.clone(), !self.is_fresh(e, now)))
    }

    pub fn insert(&self, key: &str, events: Vec<Event>, now: u64, source_count: usize) {
        let mut map = self.entries.lock().expect("cache mutex poisoned");
        map.insert(
            key.to_string(),
            CacheEntry {
                events,
                fetched_at: now,
                source_count,
            },
        );
    }

    /// Administrative reset: drop everything.
    pub fn clear(&self) {
        self.entries.lock().expect("cache mutex poisoned").clear();
    }
}
