// src/config.rs
//! Run configuration, built once at startup and passed by reference.
//!
//! Sources, later ones win:
//! 1) `$DEALS_CONFIG_PATH`, else `config/deals.toml`, else `config/deals.json`
//! 2) environment overrides (`TELEGRAM_TOKEN`, `MIN_DISCOUNT`, ...)
//! 3) sanitization of out-of-range values

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "DEALS_CONFIG_PATH";

pub const DEFAULT_BASE_URL: &str = "https://www.amazon.it";
pub const DEFAULT_GOLDBOX_PATH: &str = "/gp/goldbox";

/// Upper bounds applied by [`DealsConfig::sanitize`].
pub const MAX_RETENTION_HOURS: u64 = 24 * 365;
pub const MAX_FETCH_RETRIES: u8 = 5;

/// One page the discoverer scans for identifier-bearing cards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEndpoint {
    pub name: String,
    pub url: String,
}

impl SourceEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DealsConfig {
    pub base_url: String,
    pub affiliate_tag: Option<String>,
    pub endpoints: Vec<SourceEndpoint>,
    /// Identifiers taken from a single endpoint.
    pub per_endpoint_cap: usize,
    /// Candidates extracted per run, after history filtering.
    pub max_candidates: usize,
    pub min_discount: u8,
    pub max_items: usize,
    pub retention_hours: u64,
    pub history_path: PathBuf,
    pub history_max_entries: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_retries: u8,
    pub concurrency: usize,
    pub run_timeout_secs: u64,
    pub announce_start: bool,
    pub user_agent: String,
    pub accept_language: String,
    /// Raw `Cookie` header value sent once a consent banner has been seen.
    pub consent_cookie: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for DealsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            affiliate_tag: None,
            endpoints: vec![default_endpoint(DEFAULT_BASE_URL)],
            per_endpoint_cap: 40,
            max_candidates: 40,
            min_discount: 10,
            max_items: 10,
            retention_hours: 24,
            history_path: PathBuf::from("published.json"),
            history_max_entries: 500,
            fetch_timeout_secs: 15,
            fetch_retries: 2,
            concurrency: 4,
            run_timeout_secs: 300,
            announce_start: false,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            accept_language: "it-IT,it;q=0.9".to_string(),
            consent_cookie: None,
            telegram_token: None,
            telegram_chat_id: None,
        }
    }
}

fn default_endpoint(base_url: &str) -> SourceEndpoint {
    SourceEndpoint::new(
        "goldbox",
        format!("{}{}", base_url.trim_end_matches('/'), DEFAULT_GOLDBOX_PATH),
    )
}

impl DealsConfig {
    /// Load from file (if any), apply env overrides, sanitize.
    pub fn load() -> Result<Self> {
        let mut cfg = match config_path()? {
            Some(p) => Self::load_from(&p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Parse a TOML or JSON file. No env overrides, no sanitization.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading deals config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, &ext)
            .with_context(|| format!("parsing deals config {}", path.display()))
    }

    pub fn apply_env(&mut self) {
        if let Some(v) = env_string("TELEGRAM_TOKEN") {
            self.telegram_token = Some(v);
        }
        if let Some(v) = env_string("TELEGRAM_CHAT_ID") {
            self.telegram_chat_id = Some(v);
        }
        if let Some(v) = env_string("AFFILIATE_TAG") {
            self.affiliate_tag = Some(v);
        }
        if let Some(v) = env_string("HISTORY_PATH") {
            self.history_path = PathBuf::from(v);
        }
        if let Some(v) = env_parse("MIN_DISCOUNT") {
            self.min_discount = v;
        }
        if let Some(v) = env_parse("MAX_ITEMS") {
            self.max_items = v;
        }
        if let Some(v) = env_parse("RETENTION_HOURS") {
            self.retention_hours = v;
        }
    }

    pub fn sanitize(&mut self) {
        self.min_discount = self.min_discount.min(100);
        self.max_items = self.max_items.max(1);
        self.concurrency = self.concurrency.max(1);
        self.per_endpoint_cap = self.per_endpoint_cap.max(1);
        self.max_candidates = self.max_candidates.max(1);
        self.retention_hours = self.retention_hours.clamp(1, MAX_RETENTION_HOURS);
        self.fetch_retries = self.fetch_retries.min(MAX_FETCH_RETRIES);
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            self.base_url = DEFAULT_BASE_URL.to_string();
        }
        self.endpoints.retain(|e| !e.url.trim().is_empty());
        if self.endpoints.is_empty() {
            self.endpoints.push(default_endpoint(&self.base_url));
        }
        self.affiliate_tag = self
            .affiliate_tag
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }

    /// Retention window. Values beyond [`MAX_RETENTION_HOURS`] are capped even
    /// on an unsanitized config.
    pub fn retention(&self) -> chrono::Duration {
        let hours = self.retention_hours.min(MAX_RETENTION_HOURS);
        chrono::Duration::try_hours(hours as i64)
            .unwrap_or_else(|| chrono::Duration::hours(MAX_RETENTION_HOURS as i64))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Detail page URL for an identifier, carrying the affiliate tag when set.
    pub fn product_url(&self, asin: &str) -> String {
        match &self.affiliate_tag {
            Some(tag) => format!("{}/dp/{}?tag={}", self.base_url, asin, tag),
            None => format!("{}/dp/{}", self.base_url, asin),
        }
    }

    /// Untagged detail URL used for fetching.
    pub fn detail_url(&self, asin: &str) -> String {
        format!("{}/dp/{}", self.base_url, asin)
    }
}

/// 1) $DEALS_CONFIG_PATH  2) config/deals.toml  3) config/deals.json
fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in ["config/deals.toml", "config/deals.json"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<DealsConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).context("deals config is not valid JSON");
    }
    toml::from_str(s).context("deals config is not valid TOML")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}
