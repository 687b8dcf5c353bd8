// src/select/dedup.rs
//! Dedup-safety rule, checked against the records already selected.
//!
//! A candidate duplicates a selected record when: same country, title
//! similarity >= 0.90 and ages within 2 days. Breaking records (tier 3, at
//! most one day old) are never suppressed.

use crate::analyze::similarity::{similarity, DEDUP_SAFETY_THRESHOLD};
use crate::record::AnnotatedRecord;

pub const MAX_AGE_GAP_DAYS: f64 = 2.0;

/// Returns the selected record the candidate collides with, if any.
pub fn find_duplicate<'a>(
    candidate: &AnnotatedRecord,
    selected: impl IntoIterator<Item = &'a AnnotatedRecord>,
) -> Option<&'a AnnotatedRecord> {
    if candidate.is_breaking() {
        return None;
    }
    selected.into_iter().find(|x| {
        x.country == candidate.country
            && (candidate.age_days - x.age_days).abs() <= MAX_AGE_GAP_DAYS
            && similarity(&candidate.title, &x.title) >= DEDUP_SAFETY_THRESHOLD
    })
}

pub fn is_duplicate<'a>(
    candidate: &AnnotatedRecord,
    selected: impl IntoIterator<Item = &'a AnnotatedRecord>,
) -> bool {
    find_duplicate(candidate, selected).is_some()
}
