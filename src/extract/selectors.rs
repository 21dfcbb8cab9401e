// src/extract/selectors.rs
//! Locator lists for storefront pages, highest priority first.
//!
//! The markup changes often. When a field stops resolving, capture the page,
//! add a locator here and a card or detail fixture next to the extractor tests.

use super::chain::{FieldChain, Locator};
use super::validate;

/// One chain per logical field.
pub struct FieldSet {
    pub title: FieldChain<String>,
    pub price_now: FieldChain<f64>,
    pub price_ref: FieldChain<f64>,
    pub rating: FieldChain<f32>,
    pub reviews: FieldChain<u32>,
    pub image: FieldChain<String>,
}

/// Deal-grid and search-result cards.
pub fn card() -> FieldSet {
    FieldSet {
        title: FieldChain::new(
            "title",
            vec![
                Locator::text("card.truncate", ".a-truncate-full"),
                Locator::text("card.deal-title", "[class*='DealTitle'], [data-testid='deal-title']"),
                Locator::text("card.h2", "h2 a span, h2 span"),
                Locator::text("card.text-normal", ".a-size-base-plus.a-text-normal, .a-size-medium.a-text-normal"),
                Locator::attr("card.img-alt", "img[alt]", "alt"),
            ],
            validate::title,
        ),
        price_now: FieldChain::new(
            "price_now",
            vec![
                Locator::price(
                    "card.price",
                    ".a-price:not(.a-text-price):not([data-a-strike]) > .a-offscreen",
                ),
                Locator::price("card.deal-price", "[data-testid='price-section'] .a-price .a-offscreen"),
                Locator::price("card.price-whole", ".a-price-whole"),
            ],
            validate::price,
        ),
        price_ref: FieldChain::new(
            "price_ref",
            vec![
                Locator::price("card.strike", ".a-price[data-a-strike] .a-offscreen"),
                Locator::price("card.text-price", ".a-text-price .a-offscreen"),
                Locator::price("card.text-strike", ".a-text-strike"),
            ],
            validate::price,
        ),
        rating: FieldChain::new(
            "rating",
            vec![
                Locator::text("card.stars", "i[class*='a-icon-star'] span.a-icon-alt"),
                Locator::text("card.icon-alt", "span.a-icon-alt"),
                Locator::attr("card.aria-stars", "[aria-label*='stelle'], [aria-label*='stars']", "aria-label"),
            ],
            validate::rating,
        ),
        reviews: FieldChain::new(
            "reviews",
            vec![
                Locator::text("card.review-link", "a[href*='customerReviews'] span"),
                Locator::text("card.underline", "span.a-size-base.s-underline-text"),
            ],
            validate::review_count,
        ),
        image: FieldChain::new(
            "image",
            vec![
                Locator::attr("card.s-image", "img.s-image", "src"),
                Locator::attr("card.img", "img", "src"),
            ],
            validate::image_url,
        ),
    }
}

/// Product detail page (`/dp/{asin}`).
pub fn detail() -> FieldSet {
    FieldSet {
        title: FieldChain::new(
            "title",
            vec![
                Locator::text("detail.product-title", "#productTitle"),
                Locator::text("detail.title", "#title"),
                Locator::attr("detail.og-title", "meta[property='og:title']", "content"),
                Locator::attr("detail.meta-title", "meta[name='title']", "content"),
            ],
            validate::title,
        ),
        price_now: FieldChain::new(
            "price_now",
            vec![
                Locator::price(
                    "detail.core-price",
                    "#corePriceDisplay_desktop_feature_div .priceToPay .a-offscreen, \
                     #corePrice_feature_div .a-price:not(.a-text-price) .a-offscreen",
                ),
                Locator::price("detail.deal-price", "#priceblock_dealprice"),
                Locator::price("detail.our-price", "#priceblock_ourprice"),
                Locator::price("detail.any-price", "span.a-price:not(.a-text-price) span.a-offscreen"),
            ],
            validate::price,
        ),
        price_ref: FieldChain::new(
            "price_ref",
            vec![
                Locator::price("detail.basis-price", ".basisPrice .a-offscreen"),
                Locator::price("detail.list-price", "#listPrice, #priceblock_listprice"),
                Locator::price("detail.strike", ".a-price[data-a-strike] .a-offscreen"),
                Locator::price("detail.text-price", "span.a-text-price span.a-offscreen"),
            ],
            validate::price,
        ),
        rating: FieldChain::new(
            "rating",
            vec![
                Locator::text("detail.rating-out-of", "span[data-hook='rating-out-of-text']"),
                Locator::attr("detail.acr-popover", "#acrPopover", "title"),
                Locator::text("detail.acr-alt", "#averageCustomerReviews span.a-icon-alt"),
            ],
            validate::rating,
        ),
        reviews: FieldChain::new(
            "reviews",
            vec![
                Locator::text("detail.acr-count", "#acrCustomerReviewText"),
                Locator::text("detail.total-count", "[data-hook='total-review-count']"),
            ],
            validate::review_count,
        ),
        image: FieldChain::new(
            "image",
            vec![
                Locator::attr("detail.hires", "#landingImage", "data-old-hires"),
                Locator::attr("detail.landing", "#landingImage", "src"),
                Locator::attr("detail.book-front", "#imgBlkFront", "src"),
                Locator::attr("detail.og-image", "meta[property='og:image']", "content"),
            ],
            validate::image_url,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_locator_parses() {
        for set in [card(), detail()] {
            assert!(!set.title.locators().is_empty());
            assert!(!set.price_now.locators().is_empty());
            assert!(!set.price_ref.locators().is_empty());
            assert!(!set.rating.locators().is_empty());
            assert!(!set.reviews.locators().is_empty());
            assert!(!set.image.locators().is_empty());
        }
    }
}
