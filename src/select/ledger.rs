// src/select/ledger.rs
//! Running selection plus the tallies the capped tier checks against.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::CapConfig;
use crate::record::{AnnotatedRecord, Category};

/// Which widening step admitted a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Primary,
    FillNear,
    FillFar,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Primary => "primary",
            Phase::FillNear => "fill_near",
            Phase::FillFar => "fill_far",
        }
    }
}

/// Which admission path let a record in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Tier 3: exempt from quotas and caps.
    Breaking,
    /// Fill-up phases: best record for a missing core category.
    CoverageRepair,
    /// Greedy admission under caps and quotas.
    Capped,
}

/// Why the capped tier turned a candidate down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapLimit {
    Total,
    PerDay,
    Quota,
    Yields,
}

impl CapLimit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapLimit::Total => "cap_total",
            CapLimit::PerDay => "cap_per_day",
            CapLimit::Quota => "category_quota",
            CapLimit::Yields => "yields_cap",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub record: AnnotatedRecord,
    pub phase: Phase,
    pub admission: Admission,
}

#[derive(Debug)]
pub struct Ledger<'c> {
    caps: &'c CapConfig,
    entries: Vec<Entry>,
    fingerprints: HashSet<String>,
    per_day: HashMap<u32, usize>,
    per_category: HashMap<Category, usize>,
    results_by_category: HashMap<Category, usize>,
    yields: usize,
}

impl<'c> Ledger<'c> {
    pub fn new(caps: &'c CapConfig) -> Self {
        Self {
            caps,
            entries: Vec::new(),
            fingerprints: HashSet::new(),
            per_day: HashMap::new(),
            per_category: HashMap::new(),
            results_by_category: HashMap::new(),
            yields: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &AnnotatedRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    /// True when any fingerprint of `r` (merge provenance included) is already in.
    pub fn contains(&self, r: &AnnotatedRecord) -> bool {
        r.fingerprints().iter().any(|fp| self.fingerprints.contains(*fp))
    }

    pub fn has_category(&self, cat: Category) -> bool {
        self.per_category.get(&cat).copied().unwrap_or(0) > 0
    }

    pub fn has_result(&self, cat: Category) -> bool {
        self.results_by_category.get(&cat).copied().unwrap_or(0) > 0
    }

    /// Core categories without a result-type record yet.
    pub fn core_missing_results(&self) -> Vec<Category> {
        Category::CORE
            .into_iter()
            .filter(|c| !self.has_result(*c))
            .collect()
    }

    /// Core categories with no record at all.
    pub fn core_absent(&self) -> Vec<Category> {
        Category::CORE
            .into_iter()
            .filter(|c| !self.has_category(*c))
            .collect()
    }

    pub fn yields_full(&self) -> bool {
        self.yields >= self.caps.yields_cap
    }

    /// First capped-tier limit `r` would break, if any.
    pub fn cap_limit(&self, r: &AnnotatedRecord) -> Option<CapLimit> {
        if self.entries.len() >= self.caps.cap_total {
            return Some(CapLimit::Total);
        }
        if r.is_yields_topic() && self.yields_full() {
            return Some(CapLimit::Yields);
        }
        if self.per_day.get(&r.day_bucket).copied().unwrap_or(0) >= self.caps.cap_per_day {
            return Some(CapLimit::PerDay);
        }
        if self.per_category.get(&r.category).copied().unwrap_or(0)
            >= self.caps.quota_for(r.category)
        {
            return Some(CapLimit::Quota);
        }
        None
    }

    pub fn admit(&mut self, record: AnnotatedRecord, phase: Phase, admission: Admission) {
        for fp in record.fingerprints() {
            self.fingerprints.insert(fp.to_string());
        }
        *self.per_day.entry(record.day_bucket).or_insert(0) += 1;
        *self.per_category.entry(record.category).or_insert(0) += 1;
        if record.is_result {
            *self.results_by_category.entry(record.category).or_insert(0) += 1;
        }
        if record.is_yields_topic() {
            self.yields += 1;
        }
        self.entries.push(Entry {
            record,
            phase,
            admission,
        });
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}
