// src/ingest/mod.rs
pub mod config;
pub mod dedup;
pub mod normalize;
pub mod providers;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::event::{Event, SourceKind};
use crate::ingest::dedup::DedupPolicy;
use crate::ingest::types::RawRecord;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "aggregate_records_total",
            "Raw records received from adapters."
        );
        describe_counter!(
            "aggregate_kept_total",
            "Events surviving normalization + dedup."
        );
        describe_counter!(
            "aggregate_rejected_total",
            "Records rejected during normalization (unresolvable location)."
        );
        describe_counter!(
            "aggregate_dedup_total",
            "Records removed as cross-source duplicates."
        );
        describe_counter!(
            "aggregate_source_errors_total",
            "Failed fetch attempts across all sources."
        );
        describe_counter!("aggregate_cache_hits_total", "Feed served from fresh cache.");
        describe_counter!("aggregate_cache_miss_total", "Feed required a refresh.");
        describe_counter!(
            "aggregate_stale_serves_total",
            "Expired cache entries served because all sources failed."
        );
        describe_histogram!("aggregate_pass_ms", "Full aggregation pass duration in ms.");
        describe_histogram!("aggregate_parse_ms", "Adapter parse time in milliseconds.");
        describe_gauge!(
            "aggregate_last_run_ts",
            "Unix ts when an aggregation pass last completed."
        );
    });
}

/// Normalize scraped text: decode entities, strip tags, collapse whitespace.
/// Used by the news/social adapters before anything leaves them.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Outcome counters for one aggregation pass, surfaced in logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: usize,
    pub rejected: usize,
    pub deduped: usize,
    pub kept: usize,
}

/// Run the record pipeline for one settled aggregation pass:
/// normalize → dedup → merge/sort. Always runs after every fetch for the
/// pass has settled; batches arrive tagged with their adapter's kind.
pub fn run_pipeline(
    now: u64,
    batches: Vec<(SourceKind, Vec<RawRecord>)>,
    policy: &DedupPolicy,
) -> (Vec<Event>, PipelineStats) {
    ensure_metrics_described();

    let mut stats = PipelineStats::default();
    let mut normalized: Vec<Event> = Vec::new();

    for (kind, batch) in batches {
        stats.received += batch.len();
        for raw in batch {
            match normalize::normalize(raw, kind, now) {
                Some(ev) => normalized.push(ev),
                None => stats.rejected += 1,
            }
        }
    }

    let (mut kept, deduped) = dedup::dedupe(normalized, policy);
    dedup::merge_sort(&mut kept);

    stats.deduped = deduped;
    stats.kept = kept.len();

    counter!("aggregate_records_total").increment(stats.received as u64);
    counter!("aggregate_kept_total").increment(stats.kept as u64);
    counter!("aggregate_dedup_total").increment(stats.deduped as u64);
    gauge!("aggregate_last_run_ts").set(now as f64);

    (kept, stats)
}
