// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::event::SourceKind;
use crate::ingest::dedup::DedupPolicy;
use crate::retry::RetryPolicy;

const ENV_PATH: &str = "AGGREGATOR_CONFIG_PATH";

/// One upstream source entry from static configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Full aggregator configuration. Every section has defaults so an absent
/// config file still yields a working (fixture-driven) service.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub dedup: DedupPolicy,
    /// Skip a source once it reaches this many consecutive errors.
    /// 0 disables the auto-skip entirely.
    #[serde(default)]
    pub disable_after_errors: u32,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            retry: RetryPolicy::default(),
            dedup: DedupPolicy::default(),
            disable_after_errors: 0,
            sources: Vec::new(),
        }
    }
}

impl AggregatorConfig {
    /// Load from an explicit path. TOML or JSON, decided by extension with
    /// a content fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading aggregator config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let cfg: AggregatorConfig = if ext == "json" {
            serde_json::from_str(&content).context("parsing aggregator config json")?
        } else {
            match toml::from_str(&content) {
                Ok(c) => c,
                Err(toml_err) => serde_json::from_str(&content)
                    .map_err(|_| toml_err)
                    .context("parsing aggregator config toml")?,
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $AGGREGATOR_CONFIG_PATH
    /// 2) config/aggregator.toml
    /// 3) config/aggregator.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("AGGREGATOR_CONFIG_PATH points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/aggregator.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/aggregator.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    /// Contract violations fail fast at startup, never per-request.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(anyhow!("cache_ttl_secs must be positive"));
        }
        if self.retry.max_retries == 0 {
            return Err(anyhow!("retry.max_retries must be at least 1"));
        }
        if self.dedup.time_bucket_secs == 0 {
            return Err(anyhow!("dedup.time_bucket_secs must be positive"));
        }
        for src in &self.sources {
            if src.name.trim().is_empty() {
                return Err(anyhow!("source entry with empty name"));
            }
            if let Some(url) = &src.url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(anyhow!(
                        "source '{}' has malformed url '{}'",
                        src.name,
                        url
                    ));
                }
            }
        }
        Ok(())
    }

    /// Enabled flag for a named source; unknown names default to enabled so
    /// adapters registered in code but absent from config still run.
    pub fn source_enabled(&self, name: &str) -> bool {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.enabled)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_and_json_both_parse() {
        let toml_src = r#"
            cache_ttl_secs = 120

            [retry]
            max_retries = 2
            base_delay_ms = 100

            [dedup]
            coord_decimals = 3

            [[sources]]
            name = "acled"
            kind = "structured-api"
            url = "https://api.example.test/events"
        "#;
        let cfg: AggregatorConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.cache_ttl_secs, 120);
        assert_eq!(cfg.retry.max_retries, 2);
        assert_eq!(cfg.dedup.coord_decimals, 3);
        assert_eq!(cfg.sources.len(), 1);
        assert!(cfg.validate().is_ok());

        let json_src = r#"{
            "sources": [
                {"name": "wire", "kind": "news", "enabled": false}
            ]
        }"#;
        let cfg: AggregatorConfig = serde_json::from_str(json_src).unwrap();
        assert_eq!(cfg.cache_ttl_secs, 300);
        assert!(!cfg.source_enabled("wire"));
        assert!(cfg.source_enabled("unlisted"));
    }

    #[test]
    fn malformed_url_fails_validation() {
        let cfg = AggregatorConfig {
            sources: vec![SourceEntry {
                name: "bad".into(),
                kind: SourceKind::News,
                url: Some("ftp://example.test/feed".into()),
                enabled: true,
            }],
            ..AggregatorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn load_default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_PATH);

        // No files in temp CWD → built-in defaults.
        let cfg = AggregatorConfig::load_default().unwrap();
        assert_eq!(cfg.cache_ttl_secs, 300);
        assert!(cfg.sources.is_empty());

        // Env var takes precedence.
        let p = tmp.path().join("agg.json");
        std::fs::write(&p, r#"{"cache_ttl_secs": 42}"#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        let cfg = AggregatorConfig::load_default().unwrap();
        assert_eq!(cfg.cache_ttl_secs, 42);
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
