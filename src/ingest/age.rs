// src/ingest/age.rs
//! Relative and absolute time texts ("3 hours ago", "2 giorni fa", "Oct 3, 2025")
//! to an age in days, measured from an injected `now`.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

const MINUTES_PER_DAY: f64 = 1440.0;
const HOURS_PER_DAY: f64 = 24.0;
const DAYS_PER_MONTH: f64 = 30.0;

fn re_short_hours() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+)\s*h\s+ago\b").expect("short hours regex"))
}

fn re_en() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d+|an?)\s+(minutes?|mins?|hours?|hrs?|days?|weeks?|months?)\s+ago\b")
            .expect("english relative regex")
    })
}

fn re_it() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(\d+|un|una)\s+(minut[oi]|or[ae]|giorn[oi]|settiman[ae]|mes[ei])\s+fa\b")
            .expect("italian relative regex")
    })
}

fn quantity(s: &str) -> Option<f64> {
    match s {
        "a" | "an" | "un" | "una" => Some(1.0),
        n => n.parse::<u32>().ok().map(f64::from),
    }
}

/// Age in days for `text`, or `None` when nothing matches.
/// Absolute dates in the future clamp to zero.
pub fn parse_age_days(text: &str, now: DateTime<Utc>) -> Option<f64> {
    let t = text.trim().to_lowercase();
    if t.is_empty() {
        return None;
    }
    if t.contains("today") || t.contains("oggi") {
        return Some(0.0);
    }
    if t.contains("yesterday") || t.contains("ieri") {
        return Some(1.0);
    }

    if let Some(c) = re_short_hours().captures(&t) {
        return quantity(&c[1]).map(|q| q / HOURS_PER_DAY);
    }
    if let Some(c) = re_en().captures(&t) {
        let q = quantity(&c[1])?;
        let unit = &c[2];
        let days = if unit.starts_with("min") {
            q / MINUTES_PER_DAY
        } else if unit.starts_with('h') {
            q / HOURS_PER_DAY
        } else if unit.starts_with("day") {
            q
        } else if unit.starts_with("week") {
            q * 7.0
        } else {
            q * DAYS_PER_MONTH
        };
        return Some(days);
    }
    if let Some(c) = re_it().captures(&t) {
        let q = quantity(&c[1])?;
        let unit = &c[2];
        let days = if unit.starts_with("minut") {
            q / MINUTES_PER_DAY
        } else if unit.starts_with("or") {
            q / HOURS_PER_DAY
        } else if unit.starts_with("giorn") {
            q
        } else if unit.starts_with("settiman") {
            q * 7.0
        } else {
            q * DAYS_PER_MONTH
        };
        return Some(days);
    }

    parse_absolute(text.trim()).map(|dt| {
        let secs = (now - dt).num_seconds() as f64;
        (secs / 86_400.0).max(0.0)
    })
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
        }
    }
    None
}
