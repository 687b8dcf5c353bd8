//! Relevance score in [0, 100].
//!
//! score = clamp((base(category) + 0.16 * recency(age) + 0.12 * numeric + boost) * 100)
//!
//! - `base`     : per-category weight from the taxonomy (growth/inflation highest)
//! - `recency`  : step function of age, not a continuous decay
//! - `numeric`  : 1 when the text carries any number/percentage
//! - `boost`    : small bonus when the title itself hits the category rule

use crate::record::Category;
use crate::taxonomy::Taxonomy;

const RECENCY_FACTOR: f64 = 0.16;
const NUMERIC_FACTOR: f64 = 0.12;

/// Inputs for one record. Keep it small and clear.
#[derive(Clone, Copy, Debug)]
pub struct ScoreInputs {
    pub category: Category,
    pub age_days: f64,
    pub has_numbers: bool,
    /// Category-defining keywords appear in the title, not only in the body.
    pub strong_keywords: bool,
}

impl ScoreInputs {
    pub fn new(category: Category, age_days: f64, has_numbers: bool) -> Self {
        Self {
            category,
            age_days: age_days.max(0.0),
            has_numbers,
            strong_keywords: false,
        }
    }

    pub fn with_title(mut self, tax: &Taxonomy, title: &str) -> Self {
        self.strong_keywords = tax
            .rule_for(self.category)
            .map(|r| r.matches(title))
            .unwrap_or(false);
        self
    }
}

/// Bucketed recency preference.
pub fn recency_weight(age_days: f64) -> f64 {
    if age_days <= 1.0 {
        1.0
    } else if age_days <= 3.0 {
        0.85
    } else if age_days <= 7.0 {
        0.7
    } else if age_days <= 14.0 {
        0.5
    } else {
        0.35
    }
}

/// Pure function; recomputed every run.
pub fn score(tax: &Taxonomy, inputs: &ScoreInputs) -> u8 {
    let numeric = if inputs.has_numbers { 1.0 } else { 0.0 };
    let boost = if inputs.strong_keywords && inputs.category != Category::Other {
        tax.boost()
    } else {
        0.0
    };
    let raw = tax.base_weight(inputs.category)
        + recency_weight(inputs.age_days) * RECENCY_FACTOR
        + numeric * NUMERIC_FACTOR
        + boost;
    (raw * 100.0).round().clamp(0.0, 100.0) as u8
}
