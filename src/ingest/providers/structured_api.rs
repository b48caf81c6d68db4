// src/ingest/providers/structured_api.rs
//! Adapter for the structured incident API (ACLED-shaped JSON). The wire
//! format sends latitude/longitude and fatalities as strings; all of that
//! stays inside this adapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::event::SourceKind;
use crate::ingest::types::{RawRecord, SourceAdapter};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Vec<ApiRecord>,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    event_id_cnty: Option<String>,
    event_date: Option<String>,
    event_type: Option<String>,
    country: Option<String>,
    #[serde(rename = "region")]
    region: Option<String>,
    location: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    fatalities: Option<String>,
    actor1: Option<String>,
    actor2: Option<String>,
}

pub struct StructuredApiProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl StructuredApiProvider {
    pub fn from_fixture(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    fn parse_body(s: &str) -> Result<Vec<RawRecord>> {
        let t0 = std::time::Instant::now();
        let resp: ApiResponse = serde_json::from_str(s).context("parsing structured api json")?;

        let mut out = Vec::with_capacity(resp.data.len());
        for rec in resp.data {
            let actors = [rec.actor1, rec.actor2]
                .into_iter()
                .flatten()
                .filter(|a| !a.trim().is_empty())
                .collect();

            out.push(RawRecord {
                id: rec.event_id_cnty,
                place: rec.location,
                country: rec.country,
                region: rec.region,
                latitude: rec.latitude.as_deref().and_then(|s| s.parse().ok()),
                longitude: rec.longitude.as_deref().and_then(|s| s.parse().ok()),
                event_time: rec.event_date,
                category: rec.event_type,
                source_hint: Some("structured-api".to_string()),
                fatalities: rec.fatalities.as_deref().and_then(|s| s.parse().ok()),
                actors,
                // The structured feed is curated; its records count as verified.
                verified: Some(true),
                tags: Vec::new(),
            });
        }

        histogram!("aggregate_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for StructuredApiProvider {
    async fn fetch_recent(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_body(s),
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp.text().await.context("structured api .text()")?,
                    Err(e) => {
                        counter!("aggregate_source_errors_total").increment(1);
                        return Err(e).context("structured api get()");
                    }
                };
                Self::parse_body(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "acled"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StructuredApi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_typed_numbers_parse() {
        let body = r#"{"data":[{
            "event_id_cnty": "UKR12345",
            "event_date": "2025-08-01",
            "event_type": "Shelling/artillery/missile attack",
            "country": "Ukraine",
            "region": "Europe",
            "location": "Kharkiv",
            "latitude": "49.9935",
            "longitude": "36.2304",
            "fatalities": "3",
            "actor1": "Military Forces",
            "actor2": ""
        }]}"#;
        let recs = StructuredApiProvider::parse_body(body).unwrap();
        assert_eq!(recs.len(), 1);
        let r = &recs[0];
        assert_eq!(r.latitude, Some(49.9935));
        assert_eq!(r.fatalities, Some(3));
        assert_eq!(r.actors, vec!["Military Forces".to_string()]);
        assert_eq!(r.verified, Some(true));
    }

    #[test]
    fn garbage_body_is_an_error_not_a_panic() {
        assert!(StructuredApiProvider::parse_body("<html>oops</html>").is_err());
    }
}
