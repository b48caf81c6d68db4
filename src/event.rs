//! # Core Domain Types
//! The normalized incident event and its closed vocabularies. Everything
//! downstream of the adapters (dedup, severity, cache, API) speaks only
//! these types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// WGS84 point. `(0, 0)` is the unknown sentinel: it sits in the Gulf of
/// Guinea and never corresponds to a real monitored incident, so feeds that
/// send zeros for "no geo" collapse onto it naturally.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const UNKNOWN: Coordinates = Coordinates { lat: 0.0, lon: 0.0 };

    /// Build from optional raw fields. Missing, non-finite, or out-of-range
    /// values collapse to the unknown sentinel rather than erroring.
    pub fn from_raw(lat: Option<f64>, lon: Option<f64>) -> Self {
        match (lat, lon) {
            (Some(lat), Some(lon))
                if lat.is_finite()
                    && lon.is_finite()
                    && (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lon) =>
            {
                Coordinates { lat, lon }
            }
            _ => Self::UNKNOWN,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

/// Closed incident vocabulary; provider-native labels keyword-map into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Battle,
    Bombing,
    ViolenceAgainstCivilians,
    CyberAttack,
    Humanitarian,
    Protest,
    Other,
}

/// Provenance class of a record's source, orthogonal to the source's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    StructuredApi,
    News,
    Social,
    Intelligence,
    Manual,
}

impl SourceKind {
    /// Kinds whose records carry institutional trust on their own.
    pub fn is_reliable(&self) -> bool {
        matches!(self, SourceKind::StructuredApi | SourceKind::Intelligence)
    }

    /// Prefix convention for source-scoped ids ("api-…", "news-…").
    pub fn id_prefix(&self) -> &'static str {
        match self {
            SourceKind::StructuredApi => "api",
            SourceKind::News => "news",
            SourceKind::Social => "soc",
            SourceKind::Intelligence => "intel",
            SourceKind::Manual => "man",
        }
    }
}

/// Per-event severity tier; derives `Ord` so "at least High" reads as a
/// plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity tier '{other}'")),
        }
    }
}

/// Situation-wide threat level over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Minimal,
    Elevated,
    High,
    Severe,
    Critical,
}

/// One normalized incident. Every field is populated by the time an event
/// leaves the pipeline; optionality lives in `RawRecord`, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    /// Resolved human-readable location (place, country, region, or
    /// macro-region, in that priority).
    pub location: String,
    pub coordinates: Coordinates,
    /// Unix seconds, never in the future of the pass that produced it.
    pub timestamp: u64,
    pub category: Category,
    pub source: SourceKind,
    pub fatalities: u32,
    pub actors: Vec<String>,
    pub severity: Severity,
    pub verified: bool,
    pub tags: Vec<String>,
}
