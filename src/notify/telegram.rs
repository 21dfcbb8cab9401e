use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;
use crate::config::DealsConfig;
use crate::fetch::backoff_delay;

/// Telegram caps photo captions at 1024 characters.
pub const CAPTION_LIMIT: usize = 1024;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    token: Option<String>,
    chat_id: Option<String>,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            token: Some(token),
            chat_id: Some(chat_id),
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// Disabled (log-only) when token or chat id is missing.
    pub fn from_config(cfg: &DealsConfig) -> Self {
        Self {
            token: cfg.telegram_token.clone(),
            chat_id: cfg.telegram_chat_id.clone(),
            ..Self::new(String::new(), String::new())
        }
        .with_timeout(cfg.fetch_timeout_secs)
        .with_retries(cfg.fetch_retries.saturating_add(1))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Point at a different Bot API host (self-hosted server, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials().is_some()
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.token.as_deref(), self.chat_id.as_deref()) {
            (Some(t), Some(c)) if !t.is_empty() && !c.is_empty() => Some((t, c)),
            _ => None,
        }
    }

    async fn call<P: Serialize + Sync>(&self, method: &str, payload: &P) -> Result<u16> {
        let Some((token, _)) = self.credentials() else {
            tracing::debug!(method, "Telegram disabled (no TELEGRAM_TOKEN / TELEGRAM_CHAT_ID)");
            return Ok(0);
        };
        let url = format!("{}/bot{}/{}", self.api_base, token, method);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    // 4xx other than 429 will not improve with retries
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if status.is_success() {
                        return Ok(status.as_u16());
                    }
                    if retryable && attempt < self.max_retries {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(anyhow!("Telegram {method} HTTP {status}: {body}"));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    // the request URL embeds the bot token
                    let e = e.without_url();
                    return Err(anyhow!("Telegram {method} request failed: {e}"));
                }
            }
        }
    }

    fn chat_id(&self) -> &str {
        self.chat_id.as_deref().unwrap_or_default()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<u16> {
        let payload = SendMessage {
            chat_id: self.chat_id(),
            text,
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };
        self.call("sendMessage", &payload).await
    }

    /// Falls back to a plain message when the photo is rejected or the caption
    /// is too long to fit.
    async fn send_with_image(&self, image_url: &str, caption: &str) -> Result<u16> {
        if caption.chars().count() > CAPTION_LIMIT {
            return self.send(caption).await;
        }
        let payload = SendPhoto {
            chat_id: self.chat_id(),
            photo: image_url,
            caption,
            parse_mode: "HTML",
        };
        match self.call("sendPhoto", &payload).await {
            Ok(status) => Ok(status),
            Err(e) => {
                tracing::warn!(error = %e, "sendPhoto failed, falling back to text");
                self.send(caption).await
            }
        }
    }
}
