// src/ingest/mod.rs
pub mod age;
pub mod country;
pub mod providers;
pub mod types;

use crate::cache::{CacheStore, DEFAULT_RETENTION_DAYS};
use crate::ingest::age::parse_age_days;
use crate::ingest::country::{country_wanted, normalize_country};
use crate::ingest::types::RecordSource;
use crate::record::{RawRecord, ScrapedCard, MAX_HORIZON_DAYS};
use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_records_total", "Cards fetched from record sources.");
        describe_counter!(
            "ingest_discarded_total",
            "Cards dropped: unparseable time, empty title or unwanted country."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Record source fetch/parse errors."
        );
        describe_gauge!("ingest_pool_size", "Records in the last assembled pool.");
        describe_counter!("cache_pruned_total", "Cache rows removed by retention.");
        describe_counter!("select_runs_total", "Selection runs served.");
        describe_gauge!("select_output_size", "Records in the last selection.");
        describe_counter!("select_phase_runs_total", "Selector phases executed, by phase.");
    });
}

/// Longest card title or description kept, in chars.
pub const MAX_CARD_TEXT_CHARS: usize = 1500;

/// Scraped card title or description to the plain single-line text that
/// fingerprints and similarity are computed on. Entities are decoded and
/// markup dropped; a trailing full stop or similar is removed so "CPI 2.9%."
/// and "CPI 2.9%" fingerprint alike.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Strip trailing sentence punctuation (keep quotes and %)
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',' | ';' | ':') {
            out.pop();
        } else {
            break;
        }
    }

    // 6) Length cap
    if out.chars().count() > MAX_CARD_TEXT_CHARS {
        out = out.chars().take(MAX_CARD_TEXT_CHARS).collect();
    }

    out
}

/// Card to engine record. `None` when the title is empty or the time text
/// does not parse.
pub fn card_to_record(card: &ScrapedCard, now: DateTime<Utc>) -> Option<RawRecord> {
    let title = normalize_text(&card.title);
    if title.is_empty() {
        return None;
    }
    let age_days = parse_age_days(&card.time_text, now)?;
    Some(RawRecord {
        country: normalize_country(&card.country),
        title,
        description: normalize_text(&card.description),
        raw_time_text: card.time_text.trim().to_string(),
        age_days: Some(age_days),
        importance_raw: card.importance.min(3),
        category_raw: card.category_raw.trim().to_string(),
    })
}

/// Outcome of one pool assembly.
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    pub records: Vec<RawRecord>,
    pub fetched: usize,
    pub discarded: usize,
    pub source_errors: usize,
    pub pruned: usize,
    pub from_cache: usize,
}

/// Live cards from every source plus cached records, one per fingerprint.
///
/// Source failures are logged and counted but never abort the run. With a
/// cache, live records are upserted, rows past retention pruned, and cached
/// records within the 30-day horizon joined in.
pub async fn collect_pool(
    sources: &[Box<dyn RecordSource>],
    cache: Option<&dyn CacheStore>,
    countries: &[String],
    now: DateTime<Utc>,
) -> Result<PoolReport> {
    ensure_metrics_described();

    let mut report = PoolReport::default();
    let mut cards = Vec::new();
    for s in sources {
        match s.fetch().await {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", source = s.name(), cards = v.len(), "fetched");
                cards.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = s.name(), "source error");
                counter!("ingest_source_errors_total").increment(1);
                report.source_errors += 1;
            }
        }
    }
    report.fetched = cards.len();

    let mut live = Vec::with_capacity(cards.len());
    for card in &cards {
        match card_to_record(card, now) {
            Some(r) if country_wanted(&r.country, countries) => live.push(r),
            _ => report.discarded += 1,
        }
    }

    let mut by_fp: BTreeMap<String, RawRecord> = BTreeMap::new();
    for r in live {
        let fp = r.fingerprint();
        let fresher = by_fp
            .get(&fp)
            .map_or(true, |prev| r.age_days < prev.age_days);
        if fresher {
            by_fp.insert(fp, r);
        }
    }

    if let Some(cache) = cache {
        let fresh: Vec<RawRecord> = by_fp.values().cloned().collect();
        cache.upsert(&fresh, now)?;
        report.pruned = cache.prune(DEFAULT_RETENTION_DAYS, now)?;
        cache.flush()?;
        for r in cache.load(countries, MAX_HORIZON_DAYS, now)? {
            let fp = r.fingerprint();
            if !by_fp.contains_key(&fp) {
                by_fp.insert(fp, r);
                report.from_cache += 1;
            }
        }
    }
    report.records = by_fp.into_values().collect();

    counter!("ingest_records_total").increment(report.fetched as u64);
    counter!("ingest_discarded_total").increment(report.discarded as u64);
    counter!("cache_pruned_total").increment(report.pruned as u64);
    gauge!("ingest_pool_size").set(report.records.len() as f64);

    tracing::info!(
        target: "ingest",
        fetched = report.fetched,
        discarded = report.discarded,
        source_errors = report.source_errors,
        from_cache = report.from_cache,
        pool = report.records.len(),
        "pool assembled"
    );
    Ok(report)
}
