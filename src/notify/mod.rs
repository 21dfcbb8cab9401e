// src/notify/mod.rs
//! Notification channel: message rendering plus the [`Notifier`] seam.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use crate::model::ExtractedListing;

pub use telegram::TelegramNotifier;

/// Delivery sink. `Ok` carries the channel's HTTP status (0 when the channel
/// is disabled and nothing was sent).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<u16>;
    async fn send_with_image(&self, image_url: &str, caption: &str) -> Result<u16>;
}

pub const NOTICE_START: &str = "🔍 Analizzo le offerte Amazon…";
pub const NOTICE_NO_CANDIDATES: &str = "❌ Nessun prodotto trovato nelle pagine offerte.";
pub const NOTICE_NO_QUALIFYING: &str = "❌ Nessuna offerta valida trovata.";

/// HTML message for one listing (Telegram `parse_mode=HTML`).
pub fn render_listing(l: &ExtractedListing) -> String {
    let title = html_escape::encode_text(&l.title);
    let mut msg = format!("🔥 <b>{title}</b>\n");

    match (l.rating, l.reviews) {
        (Some(r), Some(n)) => msg.push_str(&format!("⭐ {} ({} recensioni)\n", fmt_decimal(r as f64, 1), n)),
        (Some(r), None) => msg.push_str(&format!("⭐ {}\n", fmt_decimal(r as f64, 1))),
        (None, Some(n)) => msg.push_str(&format!("⭐ {n} recensioni\n")),
        (None, None) => {}
    }
    if let Some(p) = l.price_now {
        msg.push_str(&format!("💶 Prezzo: {}€\n", fmt_decimal(p, 2)));
    }
    if let Some(p) = l.price_ref {
        msg.push_str(&format!("❌ Prezzo consigliato: {}€\n", fmt_decimal(p, 2)));
    }
    if let Some(d) = l.discount {
        msg.push_str(&format!("🎯 Sconto: -{d}%\n"));
    }
    let href = html_escape::encode_double_quoted_attribute(&l.url);
    msg.push_str(&format!("\n🔗 <a href=\"{href}\">Apri l'offerta</a>"));
    msg
}

/// Italian decimal comma: 1234.5 → "1234,50".
fn fmt_decimal(v: f64, places: usize) -> String {
    format!("{v:.places$}").replace('.', ",")
}

/// Captures everything it is asked to send. Optionally fails every call.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    fail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Photo { image_url: String, caption: String },
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    fn record(&self, s: Sent) -> Result<u16> {
        self.sent.lock().expect("notifier mutex poisoned").push(s);
        if self.fail {
            anyhow::bail!("delivery refused");
        }
        Ok(200)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<u16> {
        self.record(Sent::Text(text.to_string()))
    }

    async fn send_with_image(&self, image_url: &str, caption: &str) -> Result<u16> {
        self.record(Sent::Photo {
            image_url: image_url.to_string(),
            caption: caption.to_string(),
        })
    }
}
