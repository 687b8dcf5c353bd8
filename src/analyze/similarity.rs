// src/analyze/similarity.rs
//! Fuzzy text similarity for near-duplicate detection.
//!
//! Similarity: `strsim::normalized_levenshtein` over lowercased,
//! whitespace-collapsed text, in [0.0, 1.0].

use strsim::normalized_levenshtein;

/// Title-level dedup inside a topic partition.
pub const TITLE_DEDUP_THRESHOLD: f64 = 0.92;
/// Headline/core merge: descriptions this close are not appended twice.
pub const MERGE_TEXT_THRESHOLD: f64 = 0.92;
/// Cross-selection dedup-safety rule.
pub const DEDUP_SAFETY_THRESHOLD: f64 = 0.90;

/// Descriptions may embed a whole rendered card; compare only the head.
const MAX_COMPARED_CHARS: usize = 400;

fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_COMPARED_CHARS * 2));
    for w in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&w.to_lowercase());
    }
    if out.chars().count() > MAX_COMPARED_CHARS {
        out = out.chars().take(MAX_COMPARED_CHARS).collect();
    }
    out
}

pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    if a == b {
        return 1.0;
    }
    normalized_levenshtein(&a, &b)
}
