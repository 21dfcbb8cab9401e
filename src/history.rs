//! history.rs: rolling record of published identifiers (deduplication store).
//!
//! Lifecycle per run: load → filter → query → merge → persist. The whole map is
//! rewritten on persist; a failed write is logged by the caller and costs at
//! most a re-publication next run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Identifier → last-published time, epoch seconds.
pub type HistoryMap = HashMap<String, i64>;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load(&self) -> Result<HistoryMap>;
    async fn persist(&self, entries: &HistoryMap) -> Result<()>;
}

/// JSON object on disk: `{ "B0C1XYZ123": 1760000000, ... }`.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    async fn load(&self) -> Result<HistoryMap> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(HistoryMap::new()),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing history {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HistoryMap::new()),
            Err(e) => Err(e).with_context(|| format!("reading history {}", self.path.display())),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn persist(&self, entries: &HistoryMap) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_vec_pretty(entries).context("serializing history")?;
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HistoryMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: HistoryMap) -> Self {
        Self {
            inner: Mutex::new(entries),
        }
    }

    pub fn snapshot(&self) -> HistoryMap {
        self.inner.lock().expect("history mutex poisoned").clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn load(&self) -> Result<HistoryMap> {
        Ok(self.snapshot())
    }

    async fn persist(&self, entries: &HistoryMap) -> Result<()> {
        *self.inner.lock().expect("history mutex poisoned") = entries.clone();
        Ok(())
    }
}

/// The in-memory view a run works on.
#[derive(Debug, Clone)]
pub struct PublishedHistory {
    entries: HistoryMap,
    window: Duration,
    max_entries: usize,
}

impl PublishedHistory {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self::from_entries(HistoryMap::new(), window, max_entries)
    }

    pub fn from_entries(entries: HistoryMap, window: Duration, max_entries: usize) -> Self {
        Self {
            entries,
            window,
            max_entries: max_entries.max(1),
        }
    }

    /// Load from the store. An unreadable store starts an empty history.
    pub async fn load(store: &dyn HistoryStore, window: Duration, max_entries: usize) -> Self {
        let entries = match store.load().await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "history unreadable, starting empty");
                HistoryMap::new()
            }
        };
        Self::from_entries(entries, window, max_entries)
    }

    /// Drop entries at or beyond the retention window. Returns how many went.
    pub fn filter(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let (now, window) = (now.timestamp(), self.window.num_seconds());
        self.entries.retain(|_, ts| now - *ts < window);
        before - self.entries.len()
    }

    /// True iff `id` was published less than one window before `now`.
    pub fn is_recent(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(id)
            .is_some_and(|ts| now.timestamp() - *ts < self.window.num_seconds())
    }

    pub fn mark_published(&mut self, id: &str, now: DateTime<Utc>) {
        self.entries.insert(id.to_string(), now.timestamp());
    }

    /// Persist the newest `max_entries` entries.
    pub async fn persist(&self, store: &dyn HistoryStore) -> Result<()> {
        if self.entries.len() <= self.max_entries {
            return store.persist(&self.entries).await;
        }
        let mut newest: Vec<(&String, &i64)> = self.entries.iter().collect();
        newest.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let capped: HistoryMap = newest
            .into_iter()
            .take(self.max_entries)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        store.persist(&capped).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &HistoryMap {
        &self.entries
    }
}
