// src/analyze/classifier.rs
//! Classifier: free text → (category, result/preview flags, topic signature).
//!
//! Category resolution walks the taxonomy's ordered rule list and stops at the
//! first rule that matches. Result detection is its own ordered list of markers,
//! consulted only when no preview language is present.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::record::{Category, PriceVariant, YIELDS_SIGNATURE};
use crate::taxonomy::{ResultMarker, Taxonomy};

/// Classifier output for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: Category,
    /// Id of the category rule that fired (`None` → `other`).
    pub rule_id: Option<String>,
    pub is_result: bool,
    pub is_preview: bool,
    pub has_numbers: bool,
    pub is_regional_pmi: bool,
    pub price_variant: Option<PriceVariant>,
    pub topic_signature: String,
}

/// First-match category resolution. Returns the category and the id of the
/// deciding rule.
pub fn detect_category<'t>(tax: &'t Taxonomy, text: &str) -> (Category, Option<&'t str>) {
    tax.category_rules()
        .iter()
        .find(|r| r.matches(text))
        .map(|r| (r.label, Some(r.id.as_str())))
        .unwrap_or((Category::Other, None))
}

pub fn detect_preview(tax: &Taxonomy, text: &str) -> bool {
    tax.is_preview(text)
}

/// Released data: no preview language, and either numbers with a period
/// qualifier or past-tense release wording.
pub fn detect_result(tax: &Taxonomy, text: &str) -> bool {
    if tax.is_preview(text) {
        return false;
    }
    let numeric = tax.has_numbers(text);
    tax.result_rules().iter().any(|rule| match &rule.marker {
        ResultMarker::NumericWithPeriod(period) => numeric && period.is_match(text),
        ResultMarker::Phrase(re) => re.is_match(text),
    })
}

/// Topic key used to cluster reports of the same release.
///
/// - yields/rates topics collapse to `yields`;
/// - headline and core prints of one price index share `price_index:<id>`;
/// - everything else: first N title tokens, stopwords and numbers removed.
pub fn topic_signature(
    tax: &Taxonomy,
    category: Category,
    title: &str,
) -> (String, Option<PriceVariant>) {
    if category == Category::Yields {
        return (YIELDS_SIGNATURE.to_string(), None);
    }
    if category == Category::Inflation {
        if let Some(idx) = tax.price_indices().iter().find(|p| p.matches(title)) {
            let variant = if tax.is_core_variant(title) {
                PriceVariant::Core
            } else {
                PriceVariant::Headline
            };
            return (format!("price_index:{}", idx.id), Some(variant));
        }
    }
    (title_key(tax, category, title), None)
}

fn title_key(tax: &Taxonomy, category: Category, title: &str) -> String {
    static RE_WORD: OnceCell<Regex> = OnceCell::new();
    let re = RE_WORD.get_or_init(|| Regex::new(r"(?u)\w+").expect("word regex"));

    let lower = title.to_lowercase();
    let tokens: Vec<&str> = re
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
        .filter(|t| !tax.is_stopword(t))
        .take(tax.signature_tokens())
        .collect();

    if tokens.is_empty() {
        format!("{}:untitled", category)
    } else {
        tokens.join("-")
    }
}

/// Importance tier used when the scraped visual cue is missing (`raw == 0`).
pub fn infer_importance(raw: u8, category: Category, is_result: bool, is_preview: bool) -> u8 {
    use Category::*;
    if raw > 0 {
        return raw.min(3);
    }
    match (category, is_result) {
        (Growth | Inflation | Labor, true) => 3,
        (Pmi | Confidence | Housing, true) => 2,
        (Growth | Inflation | Labor | Pmi | Confidence | Housing, false) => 2,
        _ if !is_preview => 1,
        _ => 0,
    }
}

/// Classify one record from its title and description.
pub fn classify(tax: &Taxonomy, title: &str, description: &str) -> Classification {
    let text = format!("{} {}", title, description);
    let (category, rule_id) = detect_category(tax, &text);
    let is_preview = detect_preview(tax, &text);
    let is_result = detect_result(tax, &text);
    let (topic_signature, price_variant) = topic_signature(tax, category, title);

    Classification {
        category,
        rule_id: rule_id.map(str::to_string),
        is_result,
        is_preview,
        has_numbers: tax.has_numbers(&text),
        is_regional_pmi: category == Category::Pmi && tax.is_regional_pmi(&text),
        price_variant,
        topic_signature,
    }
}
