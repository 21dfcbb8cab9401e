// src/model.rs
use serde::{Deserialize, Serialize};

/// Length of a storefront product code (ASIN).
pub const ASIN_LEN: usize = 10;

/// Placeholder title when no candidate passed validation.
pub const TITLE_PLACEHOLDER: &str = "N/A";

/// Exactly ten ASCII alphanumerics, e.g. `B0C1XYZ123`.
pub fn is_valid_asin(s: &str) -> bool {
    s.len() == ASIN_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// A discovered identifier, before field extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub asin: String,
    /// Endpoint the identifier was found on.
    pub source_url: String,
    /// Outer HTML of the identifier-bearing card, when discovery saw one.
    pub card_html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedListing {
    pub asin: String,
    pub title: String,
    pub price_now: Option<f64>,
    /// Pre-discount anchor; never a per-unit price.
    pub price_ref: Option<f64>,
    /// Whole percent. `None` unless both prices exist and `price_ref > price_now`.
    pub discount: Option<u8>,
    pub rating: Option<f32>,
    pub reviews: Option<u32>,
    pub image_url: Option<String>,
    /// Detail URL with affiliate tag.
    pub url: String,
    #[serde(default)]
    pub detail_fetched: bool,
}

impl ExtractedListing {
    pub fn has_title(&self) -> bool {
        self.title != TITLE_PLACEHOLDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asin_shape() {
        assert!(is_valid_asin("B0C1XYZ123"));
        assert!(is_valid_asin("8804668237"));
        assert!(!is_valid_asin("B0C1XYZ12"));
        assert!(!is_valid_asin("B0C1XYZ1234"));
        assert!(!is_valid_asin("B0C1-YZ123"));
        assert!(!is_valid_asin(""));
    }
}
