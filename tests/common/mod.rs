// tests/common/mod.rs
// Shared fixtures: storefront-like HTML builders and a wired pipeline.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use goldbox_deals::config::SourceEndpoint;
use goldbox_deals::fetch::StaticFetcher;
use goldbox_deals::history::MemoryStore;
use goldbox_deals::notify::RecordingNotifier;
use goldbox_deals::{DealsConfig, Pipeline};

pub const BASE: &str = "https://shop.test";
pub const DEALS_1: &str = "https://shop.test/deals/1";
pub const DEALS_2: &str = "https://shop.test/deals/2";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 28, 9, 0, 0).unwrap()
}

pub fn config(endpoints: &[&str]) -> DealsConfig {
    let mut cfg = DealsConfig {
        base_url: BASE.to_string(),
        affiliate_tag: Some("deals-21".to_string()),
        endpoints: endpoints
            .iter()
            .enumerate()
            .map(|(i, url)| SourceEndpoint::new(format!("ep{i}"), *url))
            .collect(),
        min_discount: 10,
        max_items: 10,
        ..DealsConfig::default()
    };
    cfg.sanitize();
    cfg
}

/// Search/deal card with current price and any number of strike-through labels.
pub fn card(asin: &str, title: &str, now: &str, refs: &[&str]) -> String {
    let strikes: String = refs
        .iter()
        .map(|r| {
            format!(
                r#"<span class="a-price a-text-price" data-a-strike="true"><span class="a-offscreen">{r}</span></span>"#
            )
        })
        .collect();
    format!(
        r#"<div data-asin="{asin}">
             <h2><a href="/dp/{asin}"><span>{title}</span></a></h2>
             <span class="a-price"><span class="a-offscreen">{now}</span></span>
             {strikes}
           </div>"#
    )
}

/// Card carrying only the identifier; extraction must escalate.
pub fn bare_card(asin: &str) -> String {
    format!(r#"<div data-asin="{asin}"><span class="a-truncate-full">-40%</span></div>"#)
}

pub fn detail_page(title: &str, now: &str, reference: &str) -> String {
    format!(
        r#"<html><body>
             <span id="productTitle">{title}</span>
             <div id="corePriceDisplay_desktop_feature_div">
               <span class="a-price priceToPay"><span class="a-offscreen">{now}</span></span>
               <span class="basisPrice"><span class="a-price a-text-price" data-a-strike="true"><span class="a-offscreen">{reference}</span></span></span>
             </div>
           </body></html>"#
    )
}

pub fn page(cards: &[String]) -> String {
    format!("<html><body><div id=\"grid\">{}</div></body></html>", cards.join("\n"))
}

pub fn detail_url(asin: &str) -> String {
    format!("{BASE}/dp/{asin}")
}

pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub fetcher: Arc<StaticFetcher>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(cfg: DealsConfig, fetcher: StaticFetcher, store: MemoryStore) -> Harness {
    harness_with_notifier(cfg, fetcher, store, RecordingNotifier::new())
}

pub fn harness_with_notifier(
    cfg: DealsConfig,
    fetcher: StaticFetcher,
    store: MemoryStore,
    notifier: RecordingNotifier,
) -> Harness {
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(store);
    let notifier = Arc::new(notifier);
    let pipeline = Arc::new(Pipeline::new(
        cfg,
        fetcher.clone(),
        store.clone(),
        notifier.clone(),
    ));
    Harness {
        pipeline,
        fetcher,
        store,
        notifier,
    }
}
