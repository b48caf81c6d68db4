// src/ingest/dedup.rs
//! Cross-source deduplication and final ordering.
//!
//! Identity is the composite key (location, rounded coordinates, time
//! bucket, category) — never the `id` field, which differs by source for
//! the same real-world incident. First record with a key wins; later ones
//! drop silently. Two genuinely distinct incidents in the same
//! location/bucket/category collapse into one: an accepted lossy tradeoff
//! against overlapping sources reporting the same story.

use std::collections::HashSet;

use serde::Deserialize;

use crate::event::{Category, Event};

/// Tunable dedup precision. Rounding and bucket width are policy, not law.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DedupPolicy {
    /// Decimal places coordinates are rounded to before keying.
    #[serde(default = "default_coord_decimals")]
    pub coord_decimals: u32,
    /// Timestamp truncation granularity in seconds (default one day).
    #[serde(default = "default_time_bucket_secs")]
    pub time_bucket_secs: u64,
}

fn default_coord_decimals() -> u32 {
    2
}

fn default_time_bucket_secs() -> u64 {
    86_400
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            coord_decimals: default_coord_decimals(),
            time_bucket_secs: default_time_bucket_secs(),
        }
    }
}

#[derive(Hash, PartialEq, Eq)]
struct DedupKey {
    location: String,
    /// Rounded (lat, lon) in fixed-point; `None` when coordinates are the
    /// unknown sentinel, so unknowns never collide with each other on
    /// coordinates alone.
    coords: Option<(i64, i64)>,
    bucket: u64,
    category: Category,
}

impl DedupKey {
    fn for_event(ev: &Event, policy: &DedupPolicy) -> Self {
        let scale = 10f64.powi(policy.coord_decimals as i32);
        let coords = if ev.coordinates.is_unknown() {
            None
        } else {
            Some((
                (ev.coordinates.lat * scale).round() as i64,
                (ev.coordinates.lon * scale).round() as i64,
            ))
        };
        DedupKey {
            location: ev.location.trim().to_ascii_lowercase(),
            coords,
            bucket: ev.timestamp / policy.time_bucket_secs.max(1),
            category: ev.category,
        }
    }
}

/// First-seen order is preserved per key.
pub fn dedupe(events: Vec<Event>, policy: &DedupPolicy) -> (Vec<Event>, usize) {
    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(events.len());
    let mut kept = Vec::with_capacity(events.len());
    let mut dropped = 0usize;

    for ev in events {
        if seen.insert(DedupKey::for_event(&ev, policy)) {
            kept.push(ev);
        } else {
            dropped += 1;
        }
    }

    (kept, dropped)
}

/// Stable sort: timestamp descending, then severity descending. Ties beyond
/// those keys keep their prior relative order.
pub fn merge_sort(events: &mut [Event]) {
    events.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then(b.severity.cmp(&a.severity))
    });
}
