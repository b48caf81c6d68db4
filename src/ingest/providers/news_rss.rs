// src/ingest/providers/news_rss.rs
//! Adapter for scraped news/RSS feeds. Conflict-monitoring feeds carry the
//! incident text in title/description and often a `<point>` geo element
//! ("lat lon") plus `<category>` labels; location usually has to come from
//! the geo point via the normalizer's macro-region lookup.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::event::SourceKind;
use crate::ingest::normalize_text;
use crate::ingest::types::{RawRecord, SourceAdapter};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    category: Option<String>,
    /// georss-style "lat lon" pair.
    point: Option<String>,
    country: Option<String>,
}

fn parse_point(s: &str) -> Option<(f64, f64)> {
    let mut parts = s.split_whitespace();
    let lat = parts.next()?.parse().ok()?;
    let lon = parts.next()?.parse().ok()?;
    Some((lat, lon))
}

pub struct NewsRssProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl NewsRssProvider {
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

    fn parse_items_from_str(s: &str) -> Result<Vec<RawRecord>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing news rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let text_raw = format!(
                "{}. {}",
                it.title.as_deref().unwrap_or_default(),
                it.description.as_deref().unwrap_or_default()
            );
            let text = normalize_text(&text_raw);
            if text.is_empty() {
                continue;
            }

            let (latitude, longitude) = it
                .point
                .as_deref()
                .and_then(parse_point)
                .map_or((None, None), |(lat, lon)| (Some(lat), Some(lon)));

            // Category element when present, otherwise the cleaned headline
            // text feeds the downstream keyword mapping.
            let category = it.category.filter(|c| !c.trim().is_empty()).or(Some(text));

            out.push(RawRecord {
                id: it.guid,
                place: None,
                country: it.country,
                region: None,
                latitude,
                longitude,
                event_time: it.pub_date,
                category,
                source_hint: Some("news".to_string()),
                fatalities: None,
                actors: Vec::new(),
                verified: None,
                tags: Vec::new(),
            });
        }

        histogram!("aggregate_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for NewsRssProvider {
    async fn fetch_recent(&self) -> Result<Vec<RawRecord>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp.text().await.context("news rss .text()")?,
                    Err(e) => {
                        counter!("aggregate_source_errors_total").increment(1);
                        return Err(e).context("news rss get()");
                    }
                };
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "conflict-wire"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Conflict Wire</title>
    <item>
      <title>Airstrike reported near&nbsp;Kharkiv</title>
      <guid>news-abc-1</guid>
      <pubDate>Fri, 01 Aug 2025 12:00:00 GMT</pubDate>
      <description><![CDATA[<p>Multiple explosions reported.</p>]]></description>
      <point>49.99 36.23</point>
    </item>
    <item>
      <title>Protest in Tbilisi</title>
      <guid>news-abc-2</guid>
      <pubDate>Fri, 01 Aug 2025 13:00:00 GMT</pubDate>
      <description>Large demonstration downtown.</description>
      <category>protest</category>
      <country>Georgia</country>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn items_map_to_raw_records() {
        let recs = NewsRssProvider::parse_items_from_str(XML).unwrap();
        assert_eq!(recs.len(), 2);

        let first = &recs[0];
        assert_eq!(first.id.as_deref(), Some("news-abc-1"));
        assert_eq!(first.latitude, Some(49.99));
        assert_eq!(first.longitude, Some(36.23));
        // No explicit category element: headline text carries the keywords.
        assert!(first.category.as_deref().unwrap().contains("Airstrike"));
        assert!(first.country.is_none());

        let second = &recs[1];
        assert_eq!(second.category.as_deref(), Some("protest"));
        assert_eq!(second.country.as_deref(), Some("Georgia"));
    }
}
