// src/extract/validate.rs
//! Field validators. Each takes one raw candidate string and either returns the
//! typed value or rejects it.

use once_cell::sync::Lazy;
use regex::Regex;

use super::chain::collapse_ws;
use crate::price::parse_price;

pub const MIN_TITLE_CHARS: usize = 10;
pub const MAX_TITLE_CHARS: usize = 300;

/// Rejected when the title starts with one of these (pack/unit labels that
/// stand in for a title on some card layouts).
const PACK_PREFIXES: &[&str] = &[
    "confezione da",
    "pacco da",
    "pack of",
    "set da",
    "kit da",
    "pezzi",
    "unità",
];

/// Rejected anywhere in the title: UI chrome, never product text.
const LOW_INFO_PHRASES: &[&str] = &[
    "prezzo consigliato",
    "prezzo più basso",
    "offerta a tempo",
    "offerta lampo",
    "aggiungi al carrello",
    "vedi tutte le offerte",
    "spedizione gratuita",
    "sponsorizzato",
    "limited time deal",
];

static RE_PERCENT_BADGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-–]?\s*\d{1,3}([.,]\d+)?\s*%").unwrap());
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());

pub fn title(raw: &str) -> Option<String> {
    let text = collapse_ws(&html_escape::decode_html_entities(raw));
    let len = text.chars().count();
    if len < MIN_TITLE_CHARS {
        return None;
    }
    if RE_PERCENT_BADGE.is_match(&text) {
        return None;
    }
    let lower = text.to_lowercase();
    if PACK_PREFIXES.iter().any(|p| lower.starts_with(p))
        || LOW_INFO_PHRASES.iter().any(|p| lower.contains(p))
    {
        return None;
    }
    if len > MAX_TITLE_CHARS {
        return Some(text.chars().take(MAX_TITLE_CHARS).collect());
    }
    Some(text)
}

pub fn price(raw: &str) -> Option<f64> {
    parse_price(raw)
}

/// "4,5 su 5 stelle", "4.5 out of 5 stars" → 4.5
pub fn rating(raw: &str) -> Option<f32> {
    let m = RE_NUMBER.find(raw)?;
    let v: f32 = m.as_str().replace(',', ".").parse().ok()?;
    (0.0..=5.0).contains(&v).then_some(v)
}

/// "1.234 voti", "(1,234)" → 1234
pub fn review_count(raw: &str) -> Option<u32> {
    let digits: String = raw
        .split_whitespace()
        .next()?
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn image_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    (url.starts_with("https://") || url.starts_with("http://")).then(|| url.to_string())
}
