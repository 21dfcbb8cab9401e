//! # Discount Calculator
//! Pure functions, no I/O.
//!
//! `None` means "insufficient data" and is distinct from
//! `Some(0)`: the selector drops the former without treating it as "0% off".

/// Discount in whole percent, rounded half-up.
///
/// Defined only when `reference > current > 0`; the result then lies in `0..=100`.
pub fn compute_discount(current: Option<f64>, reference: Option<f64>) -> Option<u8> {
    let (now, anchor) = (current?, reference?);
    if !(now.is_finite() && anchor.is_finite()) || now <= 0.0 || anchor <= now {
        return None;
    }
    let pct = 100.0 * (anchor - now) / anchor;
    // half-up; the small epsilon absorbs binary noise such as 24.999999
    let rounded = (pct + 0.5 + 1e-9).floor();
    Some(rounded.clamp(0.0, 100.0) as u8)
}

/// Pick the discount anchor among the reference-price candidates.
///
/// Storefronts often print several strike-through prices (list price, "lowest
/// recent price", unit prices). The anchor is the smallest candidate strictly
/// greater than the current price. With no current price the first candidate
/// is kept for display only; no discount can be derived from it anyway.
pub fn select_reference(current: Option<f64>, candidates: &[f64]) -> Option<f64> {
    match current {
        None => candidates.first().copied(),
        Some(now) => candidates
            .iter()
            .copied()
            .filter(|c| *c > now)
            .min_by(|a, b| a.total_cmp(b)),
    }
}
