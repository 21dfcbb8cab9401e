//! # Price Normalizer
//! Turns storefront price labels (`"1.234,56 €"`, `"€ 14,99"`, `"19,99\u{a0}€"`)
//! into plain `f64` values.
//!
//! Unit-price annotations such as `"12,50 €/kg"` or `"3,20 € al litro"` are
//! rejected outright: they look like prices but are never a valid sale or
//! reference price. Malformed input yields `None`, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

/// Markers identifying a per-unit price. Matched against the lowercased label
/// after spaces around `/` have been removed.
const UNIT_MARKERS: &[&str] = &[
    "/l", "/kg", "/100", "/g", "/ml", "/m", "/unità", "/unita", "/pezzo", "/stk",
    "al litro", "al kg", "al chilo", "per litro", "per kg", "per unità", "per 100",
];

static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d.,]*").unwrap());
static RE_SLASH_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*/\s*").unwrap());
static RE_DOT_THOUSANDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{3})+$").unwrap());

/// Parse a locale-formatted price label. Returns `None` for anything that is
/// not a positive, finite amount or that carries a unit-price marker.
pub fn parse_price(raw: &str) -> Option<f64> {
    if raw.trim().is_empty() || is_unit_price(raw) {
        return None;
    }

    // Digit groups may be split by (narrow) non-breaking spaces: "1 234,56".
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    let token = RE_NUMBER.find(&compact)?.as_str();
    let token = token.trim_end_matches(['.', ',']);
    let value: f64 = canonicalize(token)?.parse().ok()?;

    (value.is_finite() && value > 0.0).then_some(value)
}

/// True when the label is a per-unit annotation rather than an item price.
pub fn is_unit_price(raw: &str) -> bool {
    let lower = raw.to_lowercase().replace(['\u{a0}', '\u{202f}'], " ");
    let squeezed = RE_SLASH_WS.replace_all(&lower, "/");
    UNIT_MARKERS.iter().any(|m| {
        if m.starts_with('/') {
            contains_marker(&squeezed, m)
        } else {
            squeezed.contains(m)
        }
    })
}

// "/l" must not fire on "/lb"-like tails that are part of a longer word;
// numeric markers ("/100g") may run straight into their unit.
fn contains_marker(haystack: &str, marker: &str) -> bool {
    let numeric = marker.ends_with(|c: char| c.is_ascii_digit());
    haystack.match_indices(marker).any(|(i, _)| {
        numeric
            || haystack[i + marker.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphabetic())
    })
}

/// Map a numeric token to Rust float syntax.
fn canonicalize(token: &str) -> Option<String> {
    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');

    let out = match (last_dot, last_comma) {
        (None, None) => token.to_string(),
        // "1.234,56" vs "1,234.56": whichever separator comes last is decimal
        (Some(d), Some(c)) if c > d => token.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => token.replace(',', ""),
        (None, Some(_)) => {
            if token.matches(',').count() > 1 {
                return None;
            }
            token.replace(',', ".")
        }
        (Some(_), None) => {
            if RE_DOT_THOUSANDS.is_match(token) {
                token.replace('.', "")
            } else if token.matches('.').count() > 1 {
                return None;
            } else {
                token.to_string()
            }
        }
    };
    Some(out)
}
