// src/fetch.rs
//! Fetch capability: "given a URL, return the page HTML".
//!
//! The pipeline only sees the [`Fetcher`] trait. [`HttpFetcher`] is the
//! reqwest-backed adapter; [`StaticFetcher`] serves canned pages for tests and
//! offline runs.

use async_trait::async_trait;
use metrics::counter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::DealsConfig;

/// A fetched page. `url` is the final URL after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} served an anti-bot challenge")]
    Challenge { url: String },
}

impl FetchError {
    /// Worth another attempt: timeouts, transport errors, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Challenge { .. } => false,
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Best-effort consent dismissal. `false` means a banner may still be in
    /// place; callers continue either way.
    async fn dismiss_consent(&self, _page: &FetchedPage) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

const CHALLENGE_MARKERS: &[&str] = &[
    "/errors/validatecaptcha",
    "captchacharacters",
    "api-services-support@amazon.com",
    "inserisci i caratteri visualizzati",
    "type the characters you see in this image",
    "sorry, we just need to make sure you're not a robot",
];

/// Captcha and "dog page" detection on a raw body.
pub fn is_challenge_page(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}

const CONSENT_MARKERS: &[&str] = &["sp-cc-accept", "sp-cc-rejectall-link", "cookieprefs"];

pub fn has_consent_banner(body: &str) -> bool {
    CONSENT_MARKERS.iter().any(|m| body.contains(m))
}

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_MAX_SHIFT: u32 = 5;

/// Exponential backoff before retry `attempt` (1-based): 0.5s, 1s, 2s, ...
/// capped at 16s.
pub(crate) fn backoff_delay(attempt: u8) -> Duration {
    let shift = u32::from(attempt.saturating_sub(1)).min(BACKOFF_MAX_SHIFT);
    Duration::from_millis(BACKOFF_BASE_MS << shift)
}

/// reqwest adapter with timeout, browser-like headers and bounded retries.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u8,
    consent_cookie: Option<String>,
    consent_given: AtomicBool,
}

impl HttpFetcher {
    pub fn from_config(cfg: &DealsConfig) -> anyhow::Result<Self> {
        use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&cfg.accept_language)?);

        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            timeout: cfg.fetch_timeout(),
            max_retries: cfg.fetch_retries,
            consent_cookie: cfg.consent_cookie.clone(),
            consent_given: AtomicBool::new(false),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut req = self.client.get(url).timeout(self.timeout);
        if self.consent_given.load(Ordering::Relaxed) {
            if let Some(cookie) = &self.consent_cookie {
                req = req.header(reqwest::header::COOKIE, cookie);
            }
        }

        let rsp = req.send().await.map_err(|e| map_reqwest(url, e))?;
        let status = rsp.status().as_u16();
        let final_url = rsp.url().to_string();
        let body = rsp.text().await.map_err(|e| map_reqwest(url, e))?;

        if is_challenge_page(&body) || final_url.contains("validateCaptcha") {
            return Err(FetchError::Challenge { url: url.to_string() });
        }
        if !(200..300).contains(&status) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

fn map_reqwest(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempt: u8 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    tracing::debug!(url, attempt, error = %e, "retrying fetch");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
                Err(e) => {
                    counter!("deals_fetch_errors_total").increment(1);
                    return Err(e);
                }
            }
        }
    }

    /// Plain HTTP cannot click the banner; once one is seen, later requests
    /// carry the configured consent cookie instead.
    async fn dismiss_consent(&self, page: &FetchedPage) -> bool {
        if !has_consent_banner(&page.body) {
            return true;
        }
        match &self.consent_cookie {
            Some(_) => {
                self.consent_given.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Serves fixed bodies by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    failing: HashMap<String, FetchFailure>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
pub enum FetchFailure {
    Status(u16),
    Timeout,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, failure: FetchFailure) -> Self {
        self.failing.insert(url.into(), failure);
        self
    }

    /// Every fetch sleeps this long first (drives timeout/concurrency tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// URLs requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fetch log mutex poisoned").clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.calls
            .lock()
            .expect("fetch log mutex poisoned")
            .push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(f) = self.failing.get(url) {
            return Err(match *f {
                FetchFailure::Status(status) => FetchError::Status {
                    url: url.to_string(),
                    status,
                },
                FetchFailure::Timeout => FetchError::Timeout { url: url.to_string() },
            });
        }
        match self.pages.get(url) {
            Some(body) if is_challenge_page(body) => Err(FetchError::Challenge {
                url: url.to_string(),
            }),
            Some(body) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
