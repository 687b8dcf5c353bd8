// src/analyze/grouping.rs
//! Grouper & merger: collapse near-duplicate reports of one release.
//!
//! Per `(country, topic_signature)` partition:
//! 1. prefer result-type records when the partition has any;
//! 2. keep a record only if its title is below the dedup threshold against
//!    every record already kept (best first);
//! 3. for price-index partitions, fold the best headline and best core print
//!    into one record via [`MergeCandidate`].
//!
//! Breaking records (tier 3, at most one day old) skip steps 1 and 2.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::analyze::similarity::{similarity, MERGE_TEXT_THRESHOLD, TITLE_DEDUP_THRESHOLD};
use crate::record::{AnnotatedRecord, MergeSource, PriceVariant};

/// Ranking used everywhere inside a bucket: score desc, age asc, fingerprint asc.
pub fn by_rank(a: &AnnotatedRecord, b: &AnnotatedRecord) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.age_days.partial_cmp(&b.age_days).unwrap_or(Ordering::Equal))
        .then_with(|| a.fingerprint.cmp(&b.fingerprint))
}

/// A headline/core pair about to be merged. The inputs are kept intact, so the
/// merge can always be undone with [`MergeCandidate::into_parts`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeCandidate {
    pub base: AnnotatedRecord,
    pub other: AnnotatedRecord,
}

impl MergeCandidate {
    /// Orders the pair so the better-ranked record becomes the base.
    pub fn new(a: AnnotatedRecord, b: AnnotatedRecord) -> Self {
        if by_rank(&a, &b) == Ordering::Greater {
            Self { base: b, other: a }
        } else {
            Self { base: a, other: b }
        }
    }

    /// Merged record: base fields, other's description appended unless it is
    /// near-identical, importance lifted to the higher tier, provenance set.
    pub fn merge(&self, text_threshold: f64) -> AnnotatedRecord {
        let mut out = self.base.clone();
        let other_desc = self.other.description.trim();
        if !other_desc.is_empty()
            && similarity(&self.base.description, other_desc) < text_threshold
        {
            out.description = if out.description.trim().is_empty() {
                other_desc.to_string()
            } else {
                format!("{}\n\n{}", out.description.trim_end(), other_desc)
            };
        }
        out.importance = self.base.importance.max(self.other.importance);
        out.merged_from = Some(vec![
            MergeSource::from(&self.base),
            MergeSource::from(&self.other),
        ]);
        out
    }

    pub fn into_parts(self) -> (AnnotatedRecord, AnnotatedRecord) {
        (self.base, self.other)
    }
}

impl From<&AnnotatedRecord> for MergeSource {
    fn from(r: &AnnotatedRecord) -> Self {
        Self {
            fingerprint: r.fingerprint.clone(),
            title: r.title.clone(),
            description: r.description.clone(),
            variant: r.price_variant,
            score: r.score,
            age_days: r.age_days,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Grouper {
    pub title_threshold: f64,
    pub merge_threshold: f64,
}

impl Default for Grouper {
    fn default() -> Self {
        Self {
            title_threshold: TITLE_DEDUP_THRESHOLD,
            merge_threshold: MERGE_TEXT_THRESHOLD,
        }
    }
}

impl Grouper {
    /// Reduce one pass worth of records. Output is ranked (see [`by_rank`]).
    pub fn group(&self, records: Vec<AnnotatedRecord>) -> Vec<AnnotatedRecord> {
        let input_len = records.len();
        let mut partitions: BTreeMap<(String, String), Vec<AnnotatedRecord>> = BTreeMap::new();
        for r in records {
            partitions
                .entry((r.country.clone(), r.topic_signature.clone()))
                .or_default()
                .push(r);
        }

        let mut out = Vec::with_capacity(input_len);
        for (_key, part) in partitions {
            out.extend(self.reduce_partition(part));
        }
        out.sort_by(by_rank);

        debug!(
            target: "grouping",
            input = input_len,
            output = out.len(),
            "grouped records"
        );
        out
    }

    fn reduce_partition(&self, part: Vec<AnnotatedRecord>) -> Vec<AnnotatedRecord> {
        let any_result = part.iter().any(|r| r.is_result);
        let (mut kept, mut rest): (Vec<_>, Vec<_>) = part.into_iter().partition(|r| r.is_breaking());

        if any_result {
            rest.retain(|r| r.is_result);
        }
        kept.sort_by(by_rank);
        rest.sort_by(by_rank);

        for r in rest {
            let dup = kept
                .iter()
                .any(|k| similarity(&k.title, &r.title) >= self.title_threshold);
            if !dup {
                kept.push(r);
            }
        }
        kept.sort_by(by_rank);

        if kept.iter().any(|r| r.price_variant.is_some()) {
            kept = self.merge_price_variants(kept);
        }
        kept
    }

    /// Fold the best headline with the best core print, if both exist.
    fn merge_price_variants(&self, kept: Vec<AnnotatedRecord>) -> Vec<AnnotatedRecord> {
        let headline = kept
            .iter()
            .position(|r| r.price_variant == Some(PriceVariant::Headline));
        let core = kept
            .iter()
            .position(|r| r.price_variant == Some(PriceVariant::Core));
        let (Some(h), Some(c)) = (headline, core) else {
            return kept;
        };

        let mut rest = Vec::with_capacity(kept.len() - 1);
        let mut pair = Vec::with_capacity(2);
        for (i, r) in kept.into_iter().enumerate() {
            if i == h || i == c {
                pair.push(r);
            } else {
                rest.push(r);
            }
        }
        let b = pair.pop().expect("pair has two records");
        let a = pair.pop().expect("pair has two records");
        let merged = MergeCandidate::new(a, b).merge(self.merge_threshold);
        debug!(
            target: "grouping",
            signature = %merged.topic_signature,
            "merged headline and core prints"
        );
        rest.push(merged);
        rest.sort_by(by_rank);
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::annotate;
    use crate::record::RawRecord;
    use crate::taxonomy::Taxonomy;

    fn rec(t: &Taxonomy, title: &str, desc: &str, age: f64, importance: u8) -> AnnotatedRecord {
        let raw = RawRecord::new("United States", title, desc, age).with_importance(importance);
        annotate(t, &raw).expect("annotate")
    }

    #[test]
    fn previews_drop_when_partition_has_results() {
        let t = Taxonomy::builtin();
        let result = rec(&t, "US Retail Sales", "Retail sales rose 0.4% MoM", 2.0, 2);
        let preview = rec(&t, "US Retail Sales", "Retail sales are expected to rise", 1.5, 2);
        assert_eq!(result.topic_signature, preview.topic_signature);
        let out = Grouper::default().group(vec![preview, result.clone()]);
        assert_eq!(out, vec![result]);
    }

    #[test]
    fn previews_survive_alone() {
        let t = Taxonomy::builtin();
        let preview = rec(&t, "US Retail Sales", "Retail sales are expected to rise", 1.5, 2);
        let out = Grouper::default().group(vec![preview.clone()]);
        assert_eq!(out, vec![preview]);
    }

    #[test]
    fn merge_is_reversible() {
        let t = Taxonomy::builtin();
        let h = rec(&t, "US Inflation Rate Slows to 2.9%", "Annual inflation eased to 2.9%", 3.0, 3);
        let c = rec(&t, "US Core Inflation Rate Steady at 3.2%", "Core CPI held at 3.2% YoY", 3.0, 3);
        let cand = MergeCandidate::new(c.clone(), h.clone());
        let merged = cand.merge(MERGE_TEXT_THRESHOLD);
        let srcs = merged.merged_from.clone().expect("provenance");
        assert_eq!(srcs.len(), 2);
        assert!(merged.description.contains("Annual inflation"));
        assert!(merged.description.contains("Core CPI"));
        let (a, b) = cand.into_parts();
        assert!(a == h || a == c);
        assert!(b == h || b == c);
        assert_ne!(a, b);
    }
}
