// src/extract/chain.rs
//! Extraction strategy chains: an ordered list of locators plus one validator
//! per field. The first candidate that validates wins.

use scraper::{ElementRef, Selector};

/// What to read from a matched element.
#[derive(Debug, Clone, Copy)]
pub enum Read {
    /// Visible text, whitespace collapsed.
    Text,
    /// Visible text plus the text node right after the enclosing `.a-price`
    /// wrapper. Unit prices print their "/kg" outside the wrapper.
    PriceText,
    Attr(&'static str),
}

#[derive(Debug, Clone)]
pub struct Locator {
    pub name: &'static str,
    selector: Selector,
    read: Read,
}

impl Locator {
    /// Panics on invalid CSS; locators are built from the static lists in
    /// `selectors.rs`, which a unit test parses in full.
    pub fn new(name: &'static str, css: &str, read: Read) -> Self {
        let selector = Selector::parse(css)
            .unwrap_or_else(|e| panic!("invalid selector for locator {name}: {e:?}"));
        Self {
            name,
            selector,
            read,
        }
    }

    pub fn text(name: &'static str, css: &str) -> Self {
        Self::new(name, css, Read::Text)
    }

    pub fn price(name: &'static str, css: &str) -> Self {
        Self::new(name, css, Read::PriceText)
    }

    pub fn attr(name: &'static str, css: &str, attr: &'static str) -> Self {
        Self::new(name, css, Read::Attr(attr))
    }

    /// Raw strings for every match under `root`, in document order.
    pub fn candidates<'a>(&'a self, root: ElementRef<'a>) -> impl Iterator<Item = String> + 'a {
        let read = self.read;
        root.select(&self.selector).filter_map(move |el| {
            let raw = match read {
                Read::Text => collapse_ws(&el.text().collect::<String>()),
                Read::PriceText => {
                    let mut text: String = el.text().collect();
                    if let Some(trailer) = price_trailer(el) {
                        text.push_str(&trailer);
                    }
                    collapse_ws(&text)
                }
                Read::Attr(a) => el.value().attr(a).map(str::trim).unwrap_or_default().to_string(),
            };
            (!raw.is_empty()).then_some(raw)
        })
    }
}

pub struct FieldChain<T> {
    field: &'static str,
    locators: Vec<Locator>,
    validate: fn(&str) -> Option<T>,
}

impl<T> FieldChain<T> {
    pub fn new(field: &'static str, locators: Vec<Locator>, validate: fn(&str) -> Option<T>) -> Self {
        Self {
            field,
            locators,
            validate,
        }
    }

    /// First candidate, in locator priority order, that passes validation.
    pub fn first(&self, root: ElementRef<'_>) -> Option<T> {
        for loc in &self.locators {
            for raw in loc.candidates(root) {
                if let Some(v) = (self.validate)(&raw) {
                    tracing::trace!(field = self.field, locator = loc.name, "field resolved");
                    return Some(v);
                }
                tracing::trace!(field = self.field, locator = loc.name, raw = %raw, "candidate rejected");
            }
        }
        tracing::debug!(field = self.field, "no candidate passed validation");
        None
    }

    /// Every validated candidate, in locator priority order.
    pub fn all(&self, root: ElementRef<'_>) -> Vec<T> {
        self.locators
            .iter()
            .flat_map(|loc| loc.candidates(root))
            .filter_map(|raw| (self.validate)(&raw))
            .collect()
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }
}

/// Text node following the nearest `.a-price` ancestor (or the element
/// itself), e.g. `/kg)` in `(<span class="a-price">..</span>/kg)`.
fn price_trailer(el: ElementRef<'_>) -> Option<String> {
    let wrapper = std::iter::once(*el)
        .chain(el.ancestors().take(3))
        .find(|n| {
            n.value()
                .as_element()
                .is_some_and(|e| e.classes().any(|c| c == "a-price"))
        })
        .unwrap_or(*el);
    let text = wrapper.next_sibling()?.value().as_text()?.trim().to_string();
    (!text.is_empty()).then_some(text)
}

pub(crate) fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
