// src/ingest/normalize.rs
//! Per-record normalization and validation.
//!
//! A raw record self-heals everywhere it can: bad coordinates collapse to
//! the unknown sentinel, bad timestamps substitute fetch time, unknown
//! categories fall back to `Other`, missing provenance is inferred. The one
//! hard rejection is a location that cannot be resolved by any method.

use metrics::counter;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use crate::event::{Category, Coordinates, Event, SourceKind};
use crate::ingest::types::RawRecord;
use crate::severity;

/// Ordered keyword lists for category mapping; first match wins. Matching is
/// case-insensitive substring over the provider's category string (which for
/// scraped sources may be a whole headline).
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Bombing,
        &[
            "bomb",
            "airstrike",
            "air strike",
            "air raid",
            "shelling",
            "missile",
            "explosion",
            "ied",
            "drone strike",
            "artillery",
        ],
    ),
    (
        Category::Battle,
        &["battle", "clash", "offensive", "firefight", "fighting", "ambush", "armed assault"],
    ),
    (
        Category::ViolenceAgainstCivilians,
        &["civilian", "massacre", "execution", "abduction", "kidnap", "atrocity"],
    ),
    (
        Category::CyberAttack,
        &["cyber", "hack", "ransomware", "ddos", "malware", "breach"],
    ),
    (
        Category::Humanitarian,
        &["humanitarian", "refugee", "famine", "displacement", "aid convoy", "evacuation"],
    ),
    (
        Category::Protest,
        &["protest", "riot", "demonstration", "unrest", "strike action"],
    ),
];

/// Coarse bounding boxes for reverse lookup when only coordinates resolve a
/// location: (name, lat_min, lat_max, lon_min, lon_max). First hit wins, so
/// the more specific conflict regions come before the continental catch-alls.
const MACRO_REGIONS: &[(&str, f64, f64, f64, f64)] = &[
    ("Eastern Europe", 44.0, 61.0, 20.0, 45.0),
    ("Middle East", 12.0, 42.0, 25.0, 64.0),
    ("North Africa", 18.0, 38.0, -18.0, 25.0),
    ("Sub-Saharan Africa", -35.0, 18.0, -18.0, 52.0),
    ("South Asia", 5.0, 38.0, 60.0, 93.0),
    ("East Asia", 18.0, 54.0, 93.0, 146.0),
    ("Southeast Asia", -11.0, 18.0, 93.0, 141.0),
    ("Western Europe", 36.0, 71.0, -11.0, 20.0),
    ("North America", 15.0, 72.0, -168.0, -52.0),
    ("South America", -56.0, 13.0, -82.0, -34.0),
    ("Oceania", -48.0, -1.0, 110.0, 180.0),
];

/// Normalize one record. `default_kind` is the adapter's own provenance,
/// used only when neither an explicit hint nor the id prefix resolves it.
/// Returns `None` only when no location can be resolved.
pub fn normalize(raw: RawRecord, default_kind: SourceKind, now: u64) -> Option<Event> {
    let coordinates = Coordinates::from_raw(raw.latitude, raw.longitude);

    let Some(location) = resolve_location(&raw, coordinates) else {
        counter!("aggregate_rejected_total").increment(1);
        tracing::warn!(id = ?raw.id, "record rejected: no resolvable location");
        return None;
    };

    let timestamp = match raw.event_time.as_deref() {
        Some(ts) => match parse_timestamp(ts) {
            // Future timestamps clamp to fetch time.
            Some(t) => t.min(now),
            None => {
                tracing::warn!(id = ?raw.id, raw_ts = ts, "unparseable timestamp, using fetch time");
                now
            }
        },
        None => now,
    };

    let category = map_category(raw.category.as_deref());
    let source = infer_source(raw.source_hint.as_deref(), raw.id.as_deref(), default_kind);
    // Negative input clamps to 0; values beyond u32 saturate.
    let fatalities = match raw.fatalities.unwrap_or(0) {
        f if f < 0 => 0,
        f => u32::try_from(f).unwrap_or(u32::MAX),
    };
    let verified = raw.verified.unwrap_or(false) && source.is_reliable();

    let id = raw
        .id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("{}-{}-{}", source.id_prefix(), timestamp, slug(&location)));

    let severity = severity::classify(category, fatalities, source, verified, timestamp, now);

    Some(Event {
        id,
        location,
        coordinates,
        timestamp,
        category,
        source,
        fatalities,
        actors: raw.actors,
        severity,
        verified,
        tags: raw.tags,
    })
}

/// Location priority: place → country → region → macro-region from
/// coordinates. Empty/whitespace fields count as absent.
fn resolve_location(raw: &RawRecord, coordinates: Coordinates) -> Option<String> {
    for field in [&raw.place, &raw.country, &raw.region] {
        if let Some(s) = field {
            let t = s.trim();
            if !t.is_empty() {
                return Some(t.to_string());
            }
        }
    }
    if !coordinates.is_unknown() {
        return macro_region_for(coordinates).map(str::to_string);
    }
    None
}

fn macro_region_for(c: Coordinates) -> Option<&'static str> {
    MACRO_REGIONS
        .iter()
        .find(|(_, lat_min, lat_max, lon_min, lon_max)| {
            c.lat >= *lat_min && c.lat <= *lat_max && c.lon >= *lon_min && c.lon <= *lon_max
        })
        .map(|(name, ..)| *name)
}

/// Parse a provider-native timestamp into unix seconds. Accepts raw unix
/// seconds or milliseconds, RFC 3339, RFC 2822, and the naive formats the
/// structured feeds use.
pub fn parse_timestamp(ts: &str) -> Option<u64> {
    let t = ts.trim();
    if t.is_empty() {
        return None;
    }

    if let Ok(n) = t.parse::<i64>() {
        if n < 0 {
            return None;
        }
        // Millisecond inputs detected by magnitude.
        let secs = if n >= 1_000_000_000_000 { n / 1000 } else { n };
        return u64::try_from(secs).ok();
    }

    if let Ok(dt) = OffsetDateTime::parse(t, &Rfc3339) {
        return u64::try_from(dt.to_offset(UtcOffset::UTC).unix_timestamp()).ok();
    }
    if let Ok(dt) = OffsetDateTime::parse(t, &Rfc2822) {
        return u64::try_from(dt.to_offset(UtcOffset::UTC).unix_timestamp()).ok();
    }

    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S") {
        return u64::try_from(naive.and_utc().timestamp()).ok();
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return u64::try_from(naive.and_utc().timestamp()).ok();
    }

    None
}

/// Keyword mapping into the closed vocabulary; unmapped input → `Other`.
pub fn map_category(raw: Option<&str>) -> Category {
    let Some(s) = raw else {
        return Category::Other;
    };
    let lower = s.to_ascii_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *category;
        }
    }
    Category::Other
}

/// Provenance resolution: explicit hint → id-prefix heuristic → adapter
/// default.
pub fn infer_source(hint: Option<&str>, id: Option<&str>, default_kind: SourceKind) -> SourceKind {
    if let Some(h) = hint {
        let h = h.trim().to_ascii_lowercase();
        match h.as_str() {
            "structured-api" | "api" | "acled" => return SourceKind::StructuredApi,
            "news" | "rss" => return SourceKind::News,
            "social" | "twitter" | "telegram" => return SourceKind::Social,
            "intelligence" | "intel" => return SourceKind::Intelligence,
            "manual" => return SourceKind::Manual,
            _ => {}
        }
    }
    if let Some(id) = id {
        let id = id.to_ascii_lowercase();
        for kind in [
            SourceKind::StructuredApi,
            SourceKind::News,
            SourceKind::Social,
            SourceKind::Intelligence,
            SourceKind::Manual,
        ] {
            if id.starts_with(kind.id_prefix()) {
                return kind;
            }
        }
    }
    default_kind
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
