// src/extract/mod.rs
//! # Field Extractor
//! Resolves each listing field through ordered locator chains, first on the
//! card fragment seen during discovery and, only when that leaves the listing
//! unusable, on the product detail page.

pub mod chain;
pub mod selectors;
pub mod validate;

use metrics::counter;
use scraper::{ElementRef, Html};

use crate::config::DealsConfig;
use crate::discount::{compute_discount, select_reference};
use crate::fetch::Fetcher;
use crate::model::{CandidateItem, ExtractedListing, TITLE_PLACEHOLDER};
use selectors::FieldSet;

/// Validated field values from one page representation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    pub title: Option<String>,
    pub price_now: Option<f64>,
    /// Every validated reference candidate; the anchor is chosen later.
    pub price_refs: Vec<f64>,
    pub rating: Option<f32>,
    pub reviews: Option<u32>,
    pub image_url: Option<String>,
}

impl RawFields {
    /// Detail escalation is needed when the title is unusable or no discount
    /// can be derived from the prices found so far.
    pub fn needs_detail(&self) -> bool {
        self.title.is_none()
            || self.price_now.is_none()
            || select_reference(self.price_now, &self.price_refs).is_none()
    }

    /// Fill fields still empty from `other`. Values already present win;
    /// reference candidates accumulate.
    pub fn fill_from(&mut self, other: RawFields) {
        self.title = self.title.take().or(other.title);
        self.price_now = self.price_now.or(other.price_now);
        self.rating = self.rating.or(other.rating);
        self.reviews = self.reviews.or(other.reviews);
        self.image_url = self.image_url.take().or(other.image_url);
        self.price_refs.extend(other.price_refs);
    }

    pub fn into_listing(self, asin: &str, url: String, detail_fetched: bool) -> ExtractedListing {
        let price_ref = select_reference(self.price_now, &self.price_refs);
        let discount = compute_discount(self.price_now, price_ref);
        ExtractedListing {
            asin: asin.to_string(),
            title: self.title.unwrap_or_else(|| TITLE_PLACEHOLDER.to_string()),
            price_now: self.price_now,
            price_ref,
            discount,
            rating: self.rating,
            reviews: self.reviews,
            image_url: self.image_url,
            url,
            detail_fetched,
        }
    }
}

fn extract_with(set: &FieldSet, root: ElementRef<'_>) -> RawFields {
    // overlapping locators often hit the same strike-through element
    let mut price_refs: Vec<f64> = Vec::new();
    for p in set.price_ref.all(root) {
        if !price_refs.contains(&p) {
            price_refs.push(p);
        }
    }

    RawFields {
        title: set.title.first(root),
        price_now: set.price_now.first(root),
        price_refs,
        rating: set.rating.first(root),
        reviews: set.reviews.first(root),
        image_url: set.image.first(root),
    }
}

pub struct FieldExtractor {
    card: FieldSet,
    detail: FieldSet,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self {
            card: selectors::card(),
            detail: selectors::detail(),
        }
    }

    pub fn extract_card(&self, html: &str) -> RawFields {
        let doc = Html::parse_fragment(html);
        extract_with(&self.card, doc.root_element())
    }

    pub fn extract_detail(&self, html: &str) -> RawFields {
        let doc = Html::parse_document(html);
        extract_with(&self.detail, doc.root_element())
    }

    fn card_fields(&self, candidate: &CandidateItem) -> RawFields {
        candidate
            .card_html
            .as_deref()
            .map(|h| self.extract_card(h))
            .unwrap_or_default()
    }

    /// Card fields only, no network. For candidates cut off by the run deadline.
    pub fn extract_offline(&self, candidate: &CandidateItem, cfg: &DealsConfig) -> ExtractedListing {
        self.card_fields(candidate)
            .into_listing(&candidate.asin, cfg.product_url(&candidate.asin), false)
    }

    /// Extract one candidate. Never fails: unresolved fields stay empty and
    /// the title falls back to a placeholder. The detail fetch is the only
    /// network call made here.
    pub async fn extract(
        &self,
        candidate: &CandidateItem,
        fetcher: &dyn Fetcher,
        cfg: &DealsConfig,
    ) -> ExtractedListing {
        // parsed trees are not Send; keep them out of any await
        let mut fields = self.card_fields(candidate);

        let mut detail_fetched = false;
        if fields.needs_detail() {
            counter!("deals_detail_fetches_total").increment(1);
            let url = cfg.detail_url(&candidate.asin);
            match fetcher.fetch(&url).await {
                Ok(page) => {
                    fields.fill_from(self.extract_detail(&page.body));
                    detail_fetched = true;
                }
                Err(e) => {
                    tracing::warn!(
                        asin = %candidate.asin,
                        source = %candidate.source_url,
                        error = %e,
                        "detail page fetch failed"
                    );
                }
            }
        }

        let listing = fields.into_listing(&candidate.asin, cfg.product_url(&candidate.asin), detail_fetched);
        tracing::debug!(
            asin = %listing.asin,
            discount = ?listing.discount,
            detail = detail_fetched,
            titled = listing.has_title(),
            "listing extracted"
        );
        listing
    }
}
