// src/record.rs
//! Record types flowing through the engine: raw scraped records, annotated
//! records, the category taxonomy and the cache fingerprint.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days beyond which the engine never looks (cache retention horizon).
pub const MAX_HORIZON_DAYS: f64 = 30.0;

/// Closed macro taxonomy.
/// Serialized as its lowercase label, which also works as a map key in TOML/JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Growth,
    Inflation,
    Labor,
    Pmi,
    Confidence,
    Housing,
    Yields,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Growth,
        Category::Inflation,
        Category::Labor,
        Category::Pmi,
        Category::Confidence,
        Category::Housing,
        Category::Yields,
        Category::Other,
    ];

    /// Categories whose absence triggers fill-up and coverage repair.
    pub const CORE: [Category; 4] = [
        Category::Growth,
        Category::Inflation,
        Category::Labor,
        Category::Pmi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Growth => "growth",
            Category::Inflation => "inflation",
            Category::Labor => "labor",
            Category::Pmi => "pmi",
            Category::Confidence => "confidence",
            Category::Housing => "housing",
            Category::Yields => "yields",
            Category::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    pub fn is_core(&self) -> bool {
        Self::CORE.contains(self)
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Category::parse(&s).ok_or_else(|| format!("unknown category `{}`", s))
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headline vs. "core" (ex food/energy) print of the same price index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceVariant {
    Headline,
    Core,
}

/// One card as produced by the scraper, before age parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedCard {
    pub country: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "time")]
    pub time_text: String,
    #[serde(default)]
    pub importance: u8,
    #[serde(default)]
    pub category_raw: String,
}

/// Record as handed to the engine. `age_days == None` means the time text was
/// unparseable; such records are discarded before selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub country: String,
    pub title: String,
    pub description: String,
    pub raw_time_text: String,
    pub age_days: Option<f64>,
    pub importance_raw: u8,
    pub category_raw: String,
}

impl RawRecord {
    pub fn new(country: &str, title: &str, description: &str, age_days: f64) -> Self {
        Self {
            country: country.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            raw_time_text: String::new(),
            age_days: Some(age_days),
            importance_raw: 0,
            category_raw: String::new(),
        }
    }

    pub fn with_importance(mut self, importance: u8) -> Self {
        self.importance_raw = importance.min(3);
        self
    }

    /// Title followed by description, the text every classifier rule runs on.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// A usable age: finite and non-negative.
    pub fn valid_age(&self) -> Option<f64> {
        self.age_days.filter(|a| a.is_finite() && *a >= 0.0)
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.country, &self.title, &self.description)
    }
}

/// Provenance of a record folded into another by the headline/core merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSource {
    pub fingerprint: String,
    pub title: String,
    pub description: String,
    pub variant: Option<PriceVariant>,
    pub score: u8,
    pub age_days: f64,
}

/// RawRecord plus derived fields. Recomputed each run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    pub country: String,
    pub title: String,
    pub description: String,
    pub raw_time_text: String,
    pub age_days: f64,
    pub importance_raw: u8,
    pub category_raw: String,

    pub fingerprint: String,
    pub category: Category,
    pub is_result: bool,
    pub is_preview: bool,
    pub has_numbers: bool,
    pub is_regional_pmi: bool,
    pub price_variant: Option<PriceVariant>,
    pub topic_signature: String,
    pub score: u8,
    pub importance: u8,
    pub day_bucket: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_from: Option<Vec<MergeSource>>,
}

impl AnnotatedRecord {
    /// Tier-3 item no older than one day.
    pub fn is_breaking(&self) -> bool {
        self.importance == 3 && self.age_days <= 1.0
    }

    /// Own fingerprint plus every merged-in fingerprint.
    pub fn fingerprints(&self) -> Vec<&str> {
        let mut out = vec![self.fingerprint.as_str()];
        if let Some(srcs) = &self.merged_from {
            for s in srcs {
                if s.fingerprint != self.fingerprint {
                    out.push(s.fingerprint.as_str());
                }
            }
        }
        out
    }

    pub fn is_yields_topic(&self) -> bool {
        self.topic_signature == YIELDS_SIGNATURE
    }
}

pub const YIELDS_SIGNATURE: &str = "yields";

/// Lowercase, punctuation runs to spaces, collapsed whitespace.
pub fn normalize_for_fingerprint(s: &str) -> String {
    static RE_PUNCT: OnceCell<Regex> = OnceCell::new();
    let re = RE_PUNCT
        .get_or_init(|| Regex::new(r"[\u{2013}\u{2014}\-:;,.!?()\[\]{}]+").expect("punct regex"));
    let lower = s.to_lowercase();
    let spaced = re.replace_all(&lower, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable identity used by the cache for upserts.
pub fn fingerprint(country: &str, title: &str, description: &str) -> String {
    use sha2::{Digest, Sha256};
    let head: String = description.chars().take(200).collect();
    let base = format!(
        "{}|{}|{}",
        country.trim(),
        normalize_for_fingerprint(title),
        normalize_for_fingerprint(&head)
    );
    let digest = Sha256::digest(base.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_punctuation_and_case() {
        let a = fingerprint("Germany", "Ifo: Business Climate Falls!", "The index fell.");
        let b = fingerprint("Germany", "ifo business climate falls", "the index fell");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_only_uses_description_head() {
        let head = "x".repeat(200);
        let a = fingerprint("Japan", "Tankan", &format!("{head} tail one"));
        let b = fingerprint("Japan", "Tankan", &format!("{head} tail two"));
        assert_eq!(a, b);
        assert_ne!(a, fingerprint("Italy", "Tankan", &head));
    }

    #[test]
    fn category_parse_roundtrips_labels() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse("  PMI "), Some(Category::Pmi));
        assert_eq!(Category::parse("bonds"), None);
    }

    #[test]
    fn invalid_ages_are_rejected() {
        let mut r = RawRecord::new("Italy", "t", "d", 1.5);
        assert_eq!(r.valid_age(), Some(1.5));
        r.age_days = Some(-0.1);
        assert_eq!(r.valid_age(), None);
        r.age_days = Some(f64::NAN);
        assert_eq!(r.valid_age(), None);
        r.age_days = None;
        assert_eq!(r.valid_age(), None);
    }
}
