//! # Ranker & Selector
//! Pure functions. Input order is discovery order; ties keep it.

use crate::model::ExtractedListing;

/// Qualifies when the discount is defined and at least `min_discount`.
pub fn qualifies(listing: &ExtractedListing, min_discount: u8) -> bool {
    listing.discount.is_some_and(|d| d >= min_discount)
}

/// Filter by minimum discount, stable sort by discount descending, truncate.
pub fn select(
    listings: Vec<ExtractedListing>,
    min_discount: u8,
    max_items: usize,
) -> Vec<ExtractedListing> {
    let mut kept: Vec<ExtractedListing> = listings
        .into_iter()
        .filter(|l| qualifies(l, min_discount))
        .collect();
    // `sort_by` is stable: equal discounts stay first-seen-first
    kept.sort_by(|a, b| b.discount.cmp(&a.discount));
    kept.truncate(max_items);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(asin: &str, discount: Option<u8>) -> ExtractedListing {
        ExtractedListing {
            asin: asin.into(),
            title: format!("Prodotto di prova {asin}"),
            price_now: Some(10.0),
            price_ref: Some(20.0),
            discount,
            rating: None,
            reviews: None,
            image_url: None,
            url: format!("https://www.amazon.it/dp/{asin}"),
            detail_fetched: false,
        }
    }

    fn ids(v: &[ExtractedListing]) -> Vec<&str> {
        v.iter().map(|l| l.asin.as_str()).collect()
    }

    #[test]
    fn sorted_desc_and_ties_keep_discovery_order() {
        let out = select(
            vec![
                item("A", Some(20)),
                item("B", Some(40)),
                item("C", Some(20)),
                item("D", Some(40)),
            ],
            10,
            10,
        );
        assert_eq!(ids(&out), vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn threshold_and_undefined_discount() {
        let out = select(
            vec![item("A", Some(9)), item("B", Some(10)), item("C", None), item("D", Some(0))],
            10,
            10,
        );
        assert_eq!(ids(&out), vec!["B"]);
        // min 0 still excludes an undefined discount
        let out = select(vec![item("C", None), item("D", Some(0))], 0, 10);
        assert_eq!(ids(&out), vec!["D"]);
    }

    #[test]
    fn truncates_to_batch_size() {
        let items: Vec<_> = (0..15u8)
            .map(|i| item(&format!("ID{i:02}"), Some(10 + i)))
            .collect();
        let out = select(items, 10, 10);
        assert_eq!(out.len(), 10);
        assert_eq!(out[0].discount, Some(24));
        assert_eq!(out[9].discount, Some(15));
    }
}
