// src/analyze/mod.rs
//! Annotation pipeline: classifier + scorer over raw records, then grouping.

pub mod classifier;
pub mod grouping;
pub mod scoring;
pub mod similarity;

use crate::record::{AnnotatedRecord, RawRecord};
use crate::taxonomy::Taxonomy;

// Re-export convenient types.
pub use crate::analyze::classifier::{classify, infer_importance, Classification};
pub use crate::analyze::grouping::{Grouper, MergeCandidate};
pub use crate::analyze::scoring::{recency_weight, score, ScoreInputs};
pub use crate::analyze::similarity::similarity;

/// Annotate one record. `None` when the record carries no usable age.
pub fn annotate(tax: &Taxonomy, raw: &RawRecord) -> Option<AnnotatedRecord> {
    let age_days = raw.valid_age()?;
    let c = classify(tax, &raw.title, &raw.description);

    let inputs = ScoreInputs::new(c.category, age_days, c.has_numbers).with_title(tax, &raw.title);
    let score = score(tax, &inputs);
    let importance = infer_importance(raw.importance_raw, c.category, c.is_result, c.is_preview);

    Some(AnnotatedRecord {
        country: raw.country.clone(),
        title: raw.title.clone(),
        description: raw.description.clone(),
        raw_time_text: raw.raw_time_text.clone(),
        age_days,
        importance_raw: raw.importance_raw,
        category_raw: raw.category_raw.clone(),
        fingerprint: raw.fingerprint(),
        category: c.category,
        is_result: c.is_result,
        is_preview: c.is_preview,
        has_numbers: c.has_numbers,
        is_regional_pmi: c.is_regional_pmi,
        price_variant: c.price_variant,
        topic_signature: c.topic_signature,
        score,
        importance,
        day_bucket: age_days.floor() as u32,
        merged_from: None,
    })
}

/// Annotate a batch, silently skipping records without a usable age.
pub fn annotate_all(tax: &Taxonomy, raws: &[RawRecord]) -> Vec<AnnotatedRecord> {
    raws.iter().filter_map(|r| annotate(tax, r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Category;

    #[test]
    fn annotate_fills_derived_fields() {
        let t = Taxonomy::builtin();
        let raw = RawRecord::new(
            "United States",
            "US Nonfarm Payrolls Rise by 254K",
            "Payrolls increased by 254K in September, the most in six months.",
            2.4,
        );
        let a = annotate(&t, &raw).expect("valid age");
        assert_eq!(a.category, Category::Labor);
        assert!(a.is_result);
        assert_eq!(a.importance, 3);
        assert_eq!(a.day_bucket, 2);
        assert_eq!(a.fingerprint, raw.fingerprint());
        assert!(a.merged_from.is_none());
    }

    #[test]
    fn records_without_age_are_skipped() {
        let t = Taxonomy::builtin();
        let mut raw = RawRecord::new("Italy", "Istat", "", 0.0);
        raw.age_days = None;
        assert!(annotate(&t, &raw).is_none());
        assert!(annotate_all(&t, &[raw]).is_empty());
    }
}
