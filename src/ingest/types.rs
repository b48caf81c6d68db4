// src/ingest/types.rs
use anyhow::Result;

use crate::event::SourceKind;

/// Provider-shaped record after the adapter's own parsing but before
/// normalization. Everything is optional on purpose: the normalizer decides
/// what self-heals to a default and what gets rejected. No untyped shape
/// crosses this boundary.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct RawRecord {
    pub id: Option<String>,
    /// Specific place name, e.g. "Kharkiv".
    pub place: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Provider-native timestamp string (unix seconds/millis, RFC 3339,
    /// RFC 2822, or a naive date with or without time-of-day).
    pub event_time: Option<String>,
    /// Provider-native category or free text to keyword-match against.
    pub category: Option<String>,
    /// Explicit provenance hint, e.g. "news" or "structured-api".
    pub source_hint: Option<String>,
    pub fatalities: Option<i64>,
    pub actors: Vec<String>,
    pub verified: Option<bool>,
    pub tags: Vec<String>,
}

/// One upstream provider. Adapters own all schema knowledge for their
/// provider and emit `RawRecord` only; failures bubble as `Err` and are
/// absorbed by the retry executor.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_recent(&self) -> Result<Vec<RawRecord>>;
    fn name(&self) -> &'static str;
    fn kind(&self) -> SourceKind;
}
