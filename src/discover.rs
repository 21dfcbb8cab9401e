// src/discover.rs
//! # Listing Discoverer
//! Scans the configured endpoints for identifier-bearing elements and yields
//! each identifier at most once per run.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tokio::time::Instant;

use crate::config::{DealsConfig, SourceEndpoint};
use crate::fetch::Fetcher;
use crate::model::{is_valid_asin, CandidateItem};

static SEL_DATA_ASIN: Lazy<Selector> = Lazy::new(|| Selector::parse("[data-asin]").unwrap());
static SEL_DP_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href*='/dp/']").unwrap());
static RE_DP_ASIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/dp/([A-Za-z0-9]{10})(?:[/?#]|$)").unwrap());

#[derive(Debug, Default)]
pub struct Discovery {
    /// Candidates in discovery order.
    pub candidates: Vec<CandidateItem>,
    pub endpoints_ok: usize,
    pub endpoints_failed: usize,
    /// The deadline hit before every endpoint was visited.
    pub timed_out: bool,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Visit every endpoint in order. A failing endpoint is logged and skipped.
/// At `deadline` the endpoint in flight is dropped and the scan stops; what
/// earlier endpoints yielded is kept.
pub async fn discover(fetcher: &dyn Fetcher, cfg: &DealsConfig, deadline: Instant) -> Discovery {
    let mut out = Discovery::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (i, endpoint) in cfg.endpoints.iter().enumerate() {
        let scan = discover_endpoint(fetcher, endpoint, cfg.per_endpoint_cap, &mut seen);
        let Ok(scanned) = tokio::time::timeout_at(deadline, scan).await else {
            tracing::warn!(
                endpoint = %endpoint.name,
                skipped = cfg.endpoints.len() - i,
                "run deadline reached during discovery"
            );
            out.timed_out = true;
            break;
        };
        match scanned {
            Ok(mut found) => {
                tracing::info!(endpoint = %endpoint.name, found = found.len(), "endpoint scanned");
                out.endpoints_ok += 1;
                out.candidates.append(&mut found);
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint.name, url = %endpoint.url, error = %e, "endpoint skipped");
                counter!("deals_endpoint_errors_total").increment(1);
                out.endpoints_failed += 1;
            }
        }
    }

    counter!("deals_candidates_total").increment(out.candidates.len() as u64);
    out
}

async fn discover_endpoint(
    fetcher: &dyn Fetcher,
    endpoint: &SourceEndpoint,
    cap: usize,
    seen: &mut HashSet<String>,
) -> Result<Vec<CandidateItem>, crate::fetch::FetchError> {
    let page = fetcher.fetch(&endpoint.url).await?;
    if !fetcher.dismiss_consent(&page).await {
        tracing::debug!(endpoint = %endpoint.name, "consent banner still present");
    }
    Ok(candidates_from_page(&page.body, &endpoint.url, cap, seen))
}

/// Identifier chain: `[data-asin]` cards first (their HTML is kept for card
/// extraction), then `/dp/{asin}` links when the page carries no cards.
pub fn candidates_from_page(
    html: &str,
    source_url: &str,
    cap: usize,
    seen: &mut HashSet<String>,
) -> Vec<CandidateItem> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();

    for el in doc.select(&SEL_DATA_ASIN) {
        if out.len() >= cap {
            return out;
        }
        let Some(asin) = el.value().attr("data-asin").map(str::trim) else {
            continue;
        };
        if !is_valid_asin(asin) || !seen.insert(asin.to_string()) {
            continue;
        }
        out.push(CandidateItem {
            asin: asin.to_string(),
            source_url: source_url.to_string(),
            card_html: Some(el.html()),
        });
    }

    if !out.is_empty() {
        return out;
    }

    for el in doc.select(&SEL_DP_LINK) {
        if out.len() >= cap {
            break;
        }
        let Some(caps) = el.value().attr("href").and_then(|h| RE_DP_ASIN.captures(h)) else {
            continue;
        };
        let asin = caps[1].to_string();
        if !is_valid_asin(&asin) || !seen.insert(asin.clone()) {
            continue;
        }
        out.push(CandidateItem {
            asin,
            source_url: source_url.to_string(),
            card_html: None,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cards_are_capped_validated_and_unique() {
        let html = r#"<html><body>
            <div data-asin="B0AAAAAAA1"><span data-asin="B0AAAAAAA1">inner</span></div>
            <div data-asin=""></div>
            <div data-asin="SHORT"></div>
            <div data-asin="B0AAAAAAA2"></div>
            <div data-asin="B0AAAAAAA3"></div>
        </body></html>"#;
        let mut seen = HashSet::new();
        let got = candidates_from_page(html, "https://e/1", 2, &mut seen);
        let ids: Vec<_> = got.iter().map(|c| c.asin.as_str()).collect();
        assert_eq!(ids, vec!["B0AAAAAAA1", "B0AAAAAAA2"]);
        assert!(got[0].card_html.as_deref().unwrap().contains("inner"));
    }

    #[test]
    fn seen_set_spans_pages() {
        let mut seen = HashSet::new();
        let a = candidates_from_page(r#"<div data-asin="B0AAAAAAA1"></div>"#, "a", 10, &mut seen);
        let b = candidates_from_page(
            r#"<div data-asin="B0AAAAAAA1"></div><div data-asin="B0AAAAAAA9"></div>"#,
            "b",
            10,
            &mut seen,
        );
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].asin, "B0AAAAAAA9");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_keeps_finished_endpoints() {
        use crate::config::SourceEndpoint;
        use crate::fetch::StaticFetcher;
        use std::time::Duration;

        let cfg = DealsConfig {
            endpoints: vec![
                SourceEndpoint::new("one", "https://e/1"),
                SourceEndpoint::new("two", "https://e/2"),
                SourceEndpoint::new("three", "https://e/3"),
            ],
            ..DealsConfig::default()
        };
        let fetcher = StaticFetcher::new()
            .with_delay(Duration::from_secs(4))
            .with_page("https://e/1", r#"<div data-asin="B0AAAAAAA1"></div>"#)
            .with_page("https://e/2", r#"<div data-asin="B0AAAAAAA2"></div>"#)
            .with_page("https://e/3", r#"<div data-asin="B0AAAAAAA3"></div>"#);

        let start = Instant::now();
        let got = discover(&fetcher, &cfg, start + Duration::from_secs(6)).await;

        assert!(got.timed_out);
        assert_eq!(got.endpoints_ok, 1);
        assert_eq!(got.candidates.len(), 1);
        assert_eq!(got.candidates[0].asin, "B0AAAAAAA1");
        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(start.elapsed().as_secs(), 6);
    }

    #[test]
    fn falls_back_to_product_links() {
        let html = r#"<a href="/Cuffie/dp/B0LINKED01/ref=x">a</a>
                      <a href="https://www.amazon.it/dp/B0LINKED02?th=1">b</a>
                      <a href="/dp/B0LINKED01">dup</a>
                      <a href="/gp/help">help</a>"#;
        let mut seen = HashSet::new();
        let got = candidates_from_page(html, "s", 10, &mut seen);
        let ids: Vec<_> = got.iter().map(|c| c.asin.as_str()).collect();
        assert_eq!(ids, vec!["B0LINKED01", "B0LINKED02"]);
        assert!(got.iter().all(|c| c.card_html.is_none()));
    }
}
