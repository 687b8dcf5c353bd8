// src/select/mod.rs
//! Selector: widening-window admission over the annotated pool.
//!
//! Three phases, each on a wider age window, run only as needed:
//! primary (`N`), fill-near (`N + expand1`, at most 30) and fill-far (30).
//! Every phase admits importance-3 records first, then (fill-up phases only)
//! repairs missing core categories, then fills greedily under the caps.
//! Records admitted in one phase are never removed by a later one.

pub mod dedup;
pub mod ledger;

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::analyze::grouping::by_rank;
use crate::analyze::{annotate, Grouper};
use crate::config::CapConfig;
use crate::devlog::{dev_log_admission, dev_logging_enabled};
use crate::record::{AnnotatedRecord, Category, RawRecord, MAX_HORIZON_DAYS};
use crate::taxonomy::Taxonomy;

pub use dedup::{find_duplicate, is_duplicate};
pub use ledger::{Admission, CapLimit, Ledger, Phase};

/// What one executed phase looked at and admitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub window_days: u32,
    /// Grouped records in the window not already selected.
    pub candidates: usize,
    pub breaking: usize,
    pub coverage_repair: usize,
    pub capped: usize,
}

/// How one output record got in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionTrace {
    pub fingerprint: String,
    pub phase: Phase,
    pub admission: Admission,
}

/// Ordered records plus the run trace. `trace[i]` describes `records[i]`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionResult {
    pub records: Vec<AnnotatedRecord>,
    pub trace: Vec<AdmissionTrace>,
    pub phases: Vec<PhaseReport>,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count_category(&self, cat: Category) -> usize {
        self.records.iter().filter(|r| r.category == cat).count()
    }
}

/// Final output order: importance desc, score desc, age asc, fingerprint asc.
fn by_output_order(a: &AnnotatedRecord, b: &AnnotatedRecord) -> std::cmp::Ordering {
    b.importance
        .cmp(&a.importance)
        .then_with(|| by_rank(a, b))
}

/// One selection run's collaborators. Holds only shared references, so a
/// `Selector` can be built per request on top of a taxonomy snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Selector<'a> {
    pub taxonomy: &'a Taxonomy,
    pub caps: &'a CapConfig,
    pub grouper: Grouper,
    /// Per-record admission logging, read from the environment once per selector.
    dev_log: bool,
}

impl<'a> Selector<'a> {
    pub fn new(taxonomy: &'a Taxonomy, caps: &'a CapConfig) -> Self {
        Self {
            taxonomy,
            caps,
            grouper: Grouper::default(),
            dev_log: dev_logging_enabled(),
        }
    }

    pub fn dev_log_enabled(&self) -> bool {
        self.dev_log
    }

    fn log_admission(&self, event: &str, r: &AnnotatedRecord, why: &str) {
        if self.dev_log {
            dev_log_admission(event, &r.title, r.category.as_str(), r.score, why);
        }
    }

    /// Annotated pool: usable ages within the horizon, one record per fingerprint.
    pub fn prepare_pool(&self, records: &[RawRecord]) -> Vec<AnnotatedRecord> {
        let mut by_fp: BTreeMap<String, AnnotatedRecord> = BTreeMap::new();
        let mut discarded = 0usize;
        for raw in records {
            let Some(age) = raw.valid_age() else {
                discarded += 1;
                continue;
            };
            if age > MAX_HORIZON_DAYS {
                discarded += 1;
                continue;
            }
            let Some(a) = annotate(self.taxonomy, raw) else {
                discarded += 1;
                continue;
            };
            match by_fp.get(&a.fingerprint) {
                // same release seen twice: keep the freshest sighting
                Some(prev) if !prefer_sighting(&a, prev) => {}
                _ => {
                    by_fp.insert(a.fingerprint.clone(), a);
                }
            }
        }
        if discarded > 0 {
            debug!(target: "selector", discarded, "dropped records without usable age");
        }
        by_fp.into_values().collect()
    }

    /// Run the phases over `records`. Once `min_target` is met, a fill-up phase
    /// only repairs core coverage: its tier-3 and capped passes are skipped, so a
    /// tier-3 record older than `window_days` stays out of a full selection.
    pub fn run(&self, records: &[RawRecord], window_days: u32, min_target: usize) -> SelectionResult {
        let pool = self.prepare_pool(records);
        let horizon = MAX_HORIZON_DAYS as u32;
        let primary = window_days.min(horizon);
        let near = window_days.saturating_add(self.caps.expand1_days).min(horizon);
        let windows = [
            (Phase::Primary, primary),
            (Phase::FillNear, near),
            (Phase::FillFar, horizon),
        ];

        let mut ledger = Ledger::new(self.caps);
        let mut phases = Vec::with_capacity(3);

        for (phase, window) in windows {
            let run_phase = match phase {
                Phase::Primary => true,
                Phase::FillNear => {
                    ledger.len() < min_target || !ledger.core_missing_results().is_empty()
                }
                Phase::FillFar => {
                    ledger.len() < min_target || self.coverage_gap(&ledger, &pool, window)
                }
            };
            if !run_phase {
                debug!(target: "selector", ?phase, selected = ledger.len(), "phase not needed");
                continue;
            }
            // once the target is met, a fill-up phase only repairs coverage
            let fill = phase == Phase::Primary || ledger.len() < min_target;
            let report = self.run_phase(&mut ledger, &pool, phase, window, fill);
            debug!(
                target: "selector",
                ?phase,
                window,
                candidates = report.candidates,
                breaking = report.breaking,
                coverage_repair = report.coverage_repair,
                capped = report.capped,
                selected = ledger.len(),
                "phase done"
            );
            phases.push(report);
        }

        let mut entries = ledger.into_entries();
        entries.sort_by(|a, b| by_output_order(&a.record, &b.record));

        let mut result = SelectionResult {
            records: Vec::with_capacity(entries.len()),
            trace: Vec::with_capacity(entries.len()),
            phases,
        };
        for e in entries {
            result.trace.push(AdmissionTrace {
                fingerprint: e.record.fingerprint.clone(),
                phase: e.phase,
                admission: e.admission,
            });
            result.records.push(e.record);
        }

        info!(
            target: "selector",
            pool = pool.len(),
            window_days,
            min_target,
            selected = result.len(),
            phases = result.phases.len(),
            "selection complete"
        );
        result
    }

    /// Some core category has no record selected while the window still holds one.
    fn coverage_gap(&self, ledger: &Ledger<'_>, pool: &[AnnotatedRecord], window: u32) -> bool {
        ledger.core_absent().into_iter().any(|cat| {
            pool.iter()
                .any(|r| r.category == cat && r.age_days <= window as f64)
        })
    }

    fn run_phase(
        &self,
        ledger: &mut Ledger<'_>,
        pool: &[AnnotatedRecord],
        phase: Phase,
        window: u32,
        fill: bool,
    ) -> PhaseReport {
        let in_window: Vec<AnnotatedRecord> = pool
            .iter()
            .filter(|r| r.age_days <= window as f64)
            .cloned()
            .collect();
        let national_pmi = in_window
            .iter()
            .any(|r| r.category == Category::Pmi && !r.is_regional_pmi);

        let mut candidates: Vec<AnnotatedRecord> = self
            .grouper
            .group(in_window)
            .into_iter()
            .filter(|r| !ledger.contains(r))
            .collect();
        candidates.sort_by(by_rank);

        let mut report = PhaseReport {
            phase,
            window_days: window,
            candidates: candidates.len(),
            breaking: 0,
            coverage_repair: 0,
            capped: 0,
        };

        // Tier 3 first, quota and per-day cap exempt.
        if fill {
            let mut rest = Vec::with_capacity(candidates.len());
            for r in candidates {
                if r.importance < 3 {
                    rest.push(r);
                    continue;
                }
                if let Some(why) = self.absolute_rejection(ledger, &r) {
                    self.log_admission("rejected", &r, why);
                    continue;
                }
                self.log_admission("admitted", &r, "breaking");
                ledger.admit(r, phase, Admission::Breaking);
                report.breaking += 1;
            }
            candidates = rest;
        }

        if phase != Phase::Primary {
            report.coverage_repair =
                self.repair_coverage(ledger, &mut candidates, phase, national_pmi);
        }

        if fill {
            for r in candidates {
                if r.importance >= 3 || ledger.contains(&r) {
                    continue;
                }
                if let Some(why) = self.capped_rejection(ledger, &r, national_pmi) {
                    self.log_admission("rejected", &r, why);
                    continue;
                }
                self.log_admission("admitted", &r, "capped");
                ledger.admit(r, phase, Admission::Capped);
                report.capped += 1;
            }
        }
        report
    }

    /// Limits that hold on every admission path: yields cap and dedup-safety.
    fn absolute_rejection(&self, ledger: &Ledger<'_>, r: &AnnotatedRecord) -> Option<&'static str> {
        if r.is_yields_topic() && ledger.yields_full() {
            return Some(CapLimit::Yields.as_str());
        }
        if is_duplicate(r, ledger.records()) {
            return Some("duplicate");
        }
        None
    }

    fn capped_rejection(
        &self,
        ledger: &Ledger<'_>,
        r: &AnnotatedRecord,
        national_pmi: bool,
    ) -> Option<&'static str> {
        if r.category == Category::Other && !r.has_numbers {
            return Some("noise");
        }
        if r.is_regional_pmi && national_pmi {
            return Some("regional_pmi");
        }
        if let Some(limit) = ledger.cap_limit(r) {
            return Some(limit.as_str());
        }
        self.absolute_rejection(ledger, r)
    }

    /// Admit the best record for each core category the selection still lacks:
    /// result first, then preview, then anything else in the category.
    /// Caps and quotas do not apply here; the regional PMI exclusion does.
    /// Returns how many were admitted.
    fn repair_coverage(
        &self,
        ledger: &mut Ledger<'_>,
        candidates: &mut Vec<AnnotatedRecord>,
        phase: Phase,
        national_pmi: bool,
    ) -> usize {
        let mut admitted = 0;
        for cat in Category::CORE {
            let has_result_candidate = candidates.iter().any(|r| r.category == cat && r.is_result);
            let missing = !ledger.has_category(cat)
                || (!ledger.has_result(cat) && has_result_candidate);
            if !missing {
                continue;
            }

            let kinds: [fn(&AnnotatedRecord) -> bool; 3] =
                [|r| r.is_result, |r| r.is_preview, |_| true];
            let pick = kinds.into_iter().find_map(|kind| {
                candidates.iter().position(|r| {
                    r.category == cat
                        && kind(r)
                        && !(national_pmi && r.is_regional_pmi && r.importance < 3)
                        && self.absolute_rejection(ledger, r).is_none()
                })
            });

            if let Some(idx) = pick {
                let r = candidates.remove(idx);
                self.log_admission("admitted", &r, "coverage_repair");
                ledger.admit(r, phase, Admission::CoverageRepair);
                admitted += 1;
            }
        }
        admitted
    }
}

/// Between two sightings of one fingerprint: lower age, then higher tier.
fn prefer_sighting(new: &AnnotatedRecord, old: &AnnotatedRecord) -> bool {
    match new.age_days.partial_cmp(&old.age_days) {
        Some(std::cmp::Ordering::Less) => true,
        Some(std::cmp::Ordering::Equal) => new.importance > old.importance,
        _ => false,
    }
}

/// Select the digest for `records`. Pure and deterministic: the same input
/// always yields the same output.
pub fn select(
    records: &[RawRecord],
    window_days: u32,
    min_target: usize,
    caps: &CapConfig,
    taxonomy: &Taxonomy,
) -> Vec<AnnotatedRecord> {
    Selector::new(taxonomy, caps)
        .run(records, window_days, min_target)
        .records
}
