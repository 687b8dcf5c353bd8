// src/cache.rs
//! Record cache: extends the look-back beyond what one scrape returns.
//!
//! Rows are keyed by fingerprint. A row remembers the age of the record when it
//! was last seen; on load the time elapsed since then is added, so cached ages
//! keep growing between scrapes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::ingest::country::country_wanted;
use crate::record::RawRecord;

/// Rows older than this are pruned.
pub const DEFAULT_RETENTION_DAYS: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRecord {
    pub fingerprint: String,
    pub country: String,
    pub title: String,
    pub description: String,
    pub time_text: String,
    pub importance: u8,
    pub category_raw: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Record age (days) at `last_seen`.
    pub age_at_seen: f64,
}

impl CachedRecord {
    fn from_raw(raw: &RawRecord, age: f64, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint: raw.fingerprint(),
            country: raw.country.clone(),
            title: raw.title.clone(),
            description: raw.description.clone(),
            time_text: raw.raw_time_text.clone(),
            importance: raw.importance_raw,
            category_raw: raw.category_raw.clone(),
            first_seen: now,
            last_seen: now,
            age_at_seen: age,
        }
    }

    /// Age at `now`: age at last sighting plus elapsed time.
    pub fn age_at(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.last_seen).num_seconds().max(0) as f64 / 86_400.0;
        self.age_at_seen + elapsed
    }

    pub fn to_raw(&self, now: DateTime<Utc>) -> RawRecord {
        RawRecord {
            country: self.country.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            raw_time_text: self.time_text.clone(),
            age_days: Some(self.age_at(now)),
            importance_raw: self.importance,
            category_raw: self.category_raw.clone(),
        }
    }
}

pub trait CacheStore: Send + Sync {
    /// Insert or refresh records; returns how many were written.
    fn upsert(&self, records: &[RawRecord], now: DateTime<Utc>) -> Result<usize>;
    /// Records for `countries` (empty = all) no older than `max_age_days` at `now`.
    fn load(&self, countries: &[String], max_age_days: f64, now: DateTime<Utc>)
        -> Result<Vec<RawRecord>>;
    /// Drop rows older than `max_age_days`; returns how many were removed.
    fn prune(&self, max_age_days: f64, now: DateTime<Utc>) -> Result<usize>;
    /// Persist pending changes, if the store has a backing file.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory store with optional JSON persistence.
#[derive(Debug, Default)]
pub struct MemoryCache {
    rows: Mutex<BTreeMap<String, CachedRecord>>,
    path: Option<PathBuf>,
    /// Held across snapshot, write and rename so saves land in order.
    write_lock: Mutex<()>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a JSON-backed cache; a missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rows = if path.exists() {
            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("reading cache {}", path.display()))?;
            let list: Vec<CachedRecord> = serde_json::from_str(&body)
                .with_context(|| format!("parsing cache {}", path.display()))?;
            list.into_iter()
                .map(|r| (r.fingerprint.clone(), r))
                .collect()
        } else {
            BTreeMap::new()
        };
        info!(target: "cache", path = %path.display(), rows = rows.len(), "cache opened");
        Ok(Self {
            rows: Mutex::new(rows),
            path: Some(path),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, fingerprint: &str) -> Option<CachedRecord> {
        self.rows
            .lock()
            .expect("cache mutex poisoned")
            .get(fingerprint)
            .cloned()
    }

    /// Write all rows to `path` (temp file + rename). Concurrent saves are
    /// serialized; the last one to finish wrote the newest snapshot.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let _guard = self.write_lock.lock().expect("cache write lock poisoned");
        let list: Vec<CachedRecord> = self
            .rows
            .lock()
            .expect("cache mutex poisoned")
            .values()
            .cloned()
            .collect();
        let body = serde_json::to_string_pretty(&list).context("serializing cache")?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating cache dir {}", dir.display()))?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        debug!(target: "cache", path = %path.display(), rows = list.len(), "cache saved");
        Ok(())
    }
}

impl CacheStore for MemoryCache {
    fn upsert(&self, records: &[RawRecord], now: DateTime<Utc>) -> Result<usize> {
        let mut rows = self.rows.lock().expect("cache mutex poisoned");
        let mut written = 0;
        for raw in records {
            let Some(age) = raw.valid_age() else {
                continue;
            };
            let fp = raw.fingerprint();
            match rows.get_mut(&fp) {
                Some(row) => {
                    row.time_text = raw.raw_time_text.clone();
                    row.importance = raw.importance_raw;
                    row.last_seen = now;
                    row.age_at_seen = age;
                }
                None => {
                    rows.insert(fp, CachedRecord::from_raw(raw, age, now));
                }
            }
            written += 1;
        }
        debug!(target: "cache", written, rows = rows.len(), "cache upsert");
        Ok(written)
    }

    fn load(
        &self,
        countries: &[String],
        max_age_days: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RawRecord>> {
        let rows = self.rows.lock().expect("cache mutex poisoned");
        Ok(rows
            .values()
            .filter(|r| country_wanted(&r.country, countries))
            .filter(|r| r.age_at(now) <= max_age_days)
            .map(|r| r.to_raw(now))
            .collect())
    }

    fn prune(&self, max_age_days: f64, now: DateTime<Utc>) -> Result<usize> {
        let mut rows = self.rows.lock().expect("cache mutex poisoned");
        let before = rows.len();
        rows.retain(|_, r| r.age_at(now) <= max_age_days);
        let removed = before - rows.len();
        if removed > 0 {
            debug!(target: "cache", removed, "cache pruned");
        }
        Ok(removed)
    }

    fn flush(&self) -> Result<()> {
        match &self.path {
            Some(p) => self.save_to(p),
            None => Ok(()),
        }
    }
}
