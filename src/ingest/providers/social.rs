// src/ingest/providers/social.rs
//! Adapter for the scraped social-media feed (JSON array of posts). Social
//! reports are the least trusted input: no fatality figures are taken at
//! face value beyond what the post states, nothing is verified, and the
//! post text itself drives downstream category matching.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::event::SourceKind;
use crate::ingest::normalize_text;
use crate::ingest::types::{RawRecord, SourceAdapter};

#[derive(Debug, Deserialize)]
struct Post {
    id: Option<String>,
    text: Option<String>,
    posted_at: Option<String>,
    #[serde(default)]
    geo: Option<Geo>,
    place_name: Option<String>,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    reported_fatalities: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Geo {
    lat: f64,
    lon: f64,
}

pub struct SocialFeedProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl SocialFeedProvider {
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
        let posts: Vec<Post> = serde_json::from_str(s).context("parsing social feed json")?;

        let mut out = Vec::with_capacity(posts.len());
        for post in posts {
            let text = normalize_text(post.text.as_deref().unwrap_or_default());
            if text.is_empty() {
                continue;
            }

            let (latitude, longitude) = post
                .geo
                .map_or((None, None), |g| (Some(g.lat), Some(g.lon)));

            let tags = post
                .hashtags
                .into_iter()
                .map(|h| h.trim_start_matches('#').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect();

            out.push(RawRecord {
                id: post.id,
                place: post.place_name,
                country: None,
                region: None,
                latitude,
                longitude,
                event_time: post.posted_at,
                category: Some(text),
                source_hint: Some("social".to_string()),
                fatalities: post.reported_fatalities,
                actors: Vec::new(),
                verified: None,
                tags,
            });
        }

        histogram!("aggregate_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for SocialFeedProvider {
    async fn fetch_recent(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_body(s),
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp.text().await.context("social feed .text()")?,
                    Err(e) => {
                        counter!("aggregate_source_errors_total").increment(1);
                        return Err(e).context("social feed get()");
                    }
                };
                Self::parse_body(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "osint-social"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }
}
