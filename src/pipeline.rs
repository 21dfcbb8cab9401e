//! # Pipeline Orchestrator
//! One run: discover → extract (bounded worker pool) → rank → publish → persist.
//!
//! Runs are serialized by an internal lock so the history store always has a
//! single writer. No error inside a run aborts it; only an empty discovery
//! ends it early.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use crate::config::DealsConfig;
use crate::discover::discover;
use crate::extract::FieldExtractor;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::history::{HistoryStore, JsonFileStore, PublishedHistory};
use crate::model::{CandidateItem, ExtractedListing};
use crate::notify::{
    render_listing, Notifier, TelegramNotifier, NOTICE_NO_CANDIDATES, NOTICE_NO_QUALIFYING,
    NOTICE_START,
};
use crate::rank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Published,
    NoCandidates,
    NoQualifying,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub outcome: RunOutcome,
    /// Listings handed to the notifier, in ranked order.
    pub published: Vec<ExtractedListing>,
    pub discovered: usize,
    pub skipped_recent: usize,
    pub extracted: usize,
    pub qualified: usize,
    pub delivered: usize,
    pub timed_out: bool,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    fn new(outcome: RunOutcome, now: DateTime<Utc>) -> Self {
        Self {
            outcome,
            published: Vec::new(),
            discovered: 0,
            skipped_recent: 0,
            extracted: 0,
            qualified: 0,
            delivered: 0,
            timed_out: false,
            finished_at: now,
        }
    }

    pub fn published_ids(&self) -> Vec<&str> {
        self.published.iter().map(|l| l.asin.as_str()).collect()
    }
}

struct Extraction {
    /// Discovery order; cut-off candidates carry card-only fields.
    listings: Vec<ExtractedListing>,
    /// Candidates that completed full extraction.
    finished: usize,
    timed_out: bool,
}

pub struct Pipeline {
    cfg: Arc<DealsConfig>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn HistoryStore>,
    notifier: Arc<dyn Notifier>,
    extractor: Arc<FieldExtractor>,
    run_lock: Arc<AsyncMutex<()>>,
    last: Mutex<Option<RunResult>>,
}

impl Pipeline {
    pub fn new(
        cfg: DealsConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn HistoryStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cfg: Arc::new(cfg),
            fetcher,
            store,
            notifier,
            extractor: Arc::new(FieldExtractor::new()),
            run_lock: Arc::new(AsyncMutex::new(())),
            last: Mutex::new(None),
        }
    }

    /// Production wiring: HTTP fetcher, JSON history file, Telegram.
    pub fn from_config(cfg: DealsConfig) -> anyhow::Result<Self> {
        let fetcher = Arc::new(HttpFetcher::from_config(&cfg)?);
        let store = Arc::new(JsonFileStore::new(cfg.history_path.clone()));
        let notifier = Arc::new(TelegramNotifier::from_config(&cfg));
        if !notifier.is_enabled() {
            tracing::warn!("Telegram credentials missing; listings will only be logged");
        }
        Ok(Self::new(cfg, fetcher, store, notifier))
    }

    pub fn config(&self) -> &DealsConfig {
        &self.cfg
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub fn last_result(&self) -> Option<RunResult> {
        self.last.lock().expect("last-run mutex poisoned").clone()
    }

    /// Run now, waiting for any active run to finish first.
    pub async fn run(&self) -> RunResult {
        self.run_at(Utc::now()).await
    }

    /// Same as [`run`](Self::run) with an explicit clock.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunResult {
        let _guard = self.run_lock.lock().await;
        self.execute(now).await
    }

    /// Start a background run unless one is already active.
    pub fn try_spawn(self: &Arc<Self>) -> Option<JoinHandle<RunResult>> {
        let guard = self.run_lock.clone().try_lock_owned().ok()?;
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _guard = guard;
            this.execute(Utc::now()).await
        }))
    }

    async fn execute(&self, now: DateTime<Utc>) -> RunResult {
        let started = Instant::now();
        let deadline = started + self.cfg.run_timeout();
        tracing::info!(
            endpoints = self.cfg.endpoints.len(),
            fetcher = self.fetcher.name(),
            "deal run started"
        );

        if self.cfg.announce_start {
            self.notice(NOTICE_START).await;
        }

        let result = self.execute_inner(now, deadline).await;

        let ms = started.elapsed().as_secs_f64() * 1_000.0;
        histogram!("deals_run_ms").record(ms);
        gauge!("deals_last_run_ts").set(now.timestamp() as f64);
        tracing::info!(
            outcome = ?result.outcome,
            discovered = result.discovered,
            skipped_recent = result.skipped_recent,
            extracted = result.extracted,
            qualified = result.qualified,
            published = result.published.len(),
            delivered = result.delivered,
            timed_out = result.timed_out,
            elapsed_ms = ms as u64,
            "deal run finished"
        );

        *self.last.lock().expect("last-run mutex poisoned") = Some(result.clone());
        result
    }

    async fn execute_inner(&self, now: DateTime<Utc>, deadline: Instant) -> RunResult {
        let discovery = discover(self.fetcher.as_ref(), &self.cfg, deadline).await;
        if discovery.is_empty() {
            tracing::warn!(
                failed_endpoints = discovery.endpoints_failed,
                timed_out = discovery.timed_out,
                "no candidates from any endpoint"
            );
            self.notice(NOTICE_NO_CANDIDATES).await;
            let mut result = RunResult::new(RunOutcome::NoCandidates, now);
            result.timed_out = discovery.timed_out;
            return result;
        }
        let discovery_timed_out = discovery.timed_out;
        let discovered = discovery.candidates.len();

        let mut history = PublishedHistory::load(
            self.store.as_ref(),
            self.cfg.retention(),
            self.cfg.history_max_entries,
        )
        .await;
        let pruned = history.filter(now);
        tracing::debug!(pruned, kept = history.len(), "history filtered");

        // recent identifiers are dropped before extraction to save detail fetches
        let (recent, fresh): (Vec<CandidateItem>, Vec<CandidateItem>) = discovery
            .candidates
            .into_iter()
            .partition(|c| history.is_recent(&c.asin, now));
        let fresh: Vec<CandidateItem> = fresh.into_iter().take(self.cfg.max_candidates).collect();

        let Extraction {
            listings,
            finished: extracted,
            timed_out,
        } = self.extract_all(fresh, deadline).await;
        let qualified = listings
            .iter()
            .filter(|l| rank::qualifies(l, self.cfg.min_discount))
            .count();
        counter!("deals_qualified_total").increment(qualified as u64);

        let selected = rank::select(listings, self.cfg.min_discount, self.cfg.max_items);

        let mut result = RunResult::new(RunOutcome::NoQualifying, now);
        result.discovered = discovered;
        result.skipped_recent = recent.len();
        result.extracted = extracted;
        result.qualified = qualified;
        result.timed_out = discovery_timed_out || timed_out;

        if selected.is_empty() {
            self.notice(NOTICE_NO_QUALIFYING).await;
        } else {
            for listing in &selected {
                if self.publish(listing).await {
                    result.delivered += 1;
                }
                // at-most-once: a failed delivery still counts as published
                history.mark_published(&listing.asin, now);
            }
            counter!("deals_published_total").increment(selected.len() as u64);
            result.outcome = RunOutcome::Published;
            result.published = selected;
        }

        if let Err(e) = history.persist(self.store.as_ref()).await {
            tracing::warn!(error = %format!("{e:#}"), "history not persisted; duplicates possible next run");
        }
        result
    }

    /// Bounded worker pool. Results are re-ordered by discovery index. At
    /// `deadline` outstanding tasks are aborted and their candidates fall back
    /// to card-only extraction.
    async fn extract_all(&self, candidates: Vec<CandidateItem>, deadline: Instant) -> Extraction {
        let results: Arc<Mutex<Vec<(usize, ExtractedListing)>>> = Arc::default();
        let permits = Arc::new(Semaphore::new(self.cfg.concurrency));
        let mut tasks = JoinSet::new();

        for (idx, candidate) in candidates.iter().cloned().enumerate() {
            let permits = Arc::clone(&permits);
            let results = Arc::clone(&results);
            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let cfg = Arc::clone(&self.cfg);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let listing = extractor.extract(&candidate, fetcher.as_ref(), &cfg).await;
                results
                    .lock()
                    .expect("results mutex poisoned")
                    .push((idx, listing));
            });
        }

        let drained = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "extraction task failed");
                }
            }
        })
        .await;

        let timed_out = drained.is_err();
        if timed_out {
            tracing::warn!(pending = tasks.len(), "run deadline reached, aborting outstanding extractions");
            tasks.abort_all();
        }

        let mut collected = std::mem::take(&mut *results.lock().expect("results mutex poisoned"));
        let finished = collected.len();
        counter!("deals_extracted_total").increment(finished as u64);

        if timed_out {
            let done: HashSet<usize> = collected.iter().map(|(idx, _)| *idx).collect();
            for (idx, candidate) in candidates.iter().enumerate() {
                if !done.contains(&idx) {
                    collected.push((idx, self.extractor.extract_offline(candidate, &self.cfg)));
                }
            }
        }

        collected.sort_by_key(|(idx, _)| *idx);
        Extraction {
            listings: collected.into_iter().map(|(_, l)| l).collect(),
            finished,
            timed_out,
        }
    }

    async fn publish(&self, listing: &ExtractedListing) -> bool {
        let text = render_listing(listing);
        let sent = match &listing.image_url {
            Some(img) => self.notifier.send_with_image(img, &text).await,
            None => self.notifier.send(&text).await,
        };
        match sent {
            Ok(status) => {
                tracing::debug!(asin = %listing.asin, status, "listing delivered");
                true
            }
            Err(e) => {
                tracing::warn!(asin = %listing.asin, error = %format!("{e:#}"), "listing delivery failed");
                counter!("deals_delivery_errors_total").increment(1);
                false
            }
        }
    }

    /// Best-effort status message; failures are only logged.
    async fn notice(&self, text: &str) -> bool {
        match self.notifier.send(text).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "notice not delivered");
                false
            }
        }
    }
}
