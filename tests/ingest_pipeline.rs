// tests/ingest_pipeline.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use macro_digest::cache::{CacheStore, MemoryCache};
use macro_digest::ingest::collect_pool;
use macro_digest::ingest::providers::{JsonFileSource, StaticSource};
use macro_digest::ingest::types::RecordSource;
use macro_digest::record::ScrapedCard;

struct BrokenSource;

#[async_trait]
impl RecordSource for BrokenSource {
    async fn fetch(&self) -> Result<Vec<ScrapedCard>> {
        Err(anyhow!("scraper timed out"))
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 15, 12, 0, 0).unwrap()
}

fn card(country: &str, title: &str, time: &str, importance: u8) -> ScrapedCard {
    ScrapedCard {
        country: country.to_string(),
        title: title.to_string(),
        time_text: time.to_string(),
        importance,
        ..ScrapedCard::default()
    }
}

fn calendar() -> Box<dyn RecordSource> {
    Box::new(StaticSource::new(
        "calendar",
        vec![
            card("Stati Uniti", "US Jobless Claims Rise to 231K", "2 days ago", 3),
            card("United States", "US Jobless Claims Rise to 231K", "3 days ago", 3),
            card("Germany", "   ", "1 day ago", 2),
            card("Japan", "Japan GDP Growth Rate 0.5% QoQ", "sometime soon", 3),
            card("Brazil", "Brazil Retail Sales Rise 1%", "yesterday", 2),
        ],
    ))
}

fn wanted() -> Vec<String> {
    vec!["United States".into(), "Germany".into(), "Japan".into()]
}

#[tokio::test]
async fn pool_dedups_filters_and_survives_source_errors() {
    let sources: Vec<Box<dyn RecordSource>> = vec![calendar(), Box::new(BrokenSource)];
    let report = collect_pool(&sources, None, &wanted(), t0()).await.unwrap();

    assert_eq!(report.fetched, 5);
    assert_eq!(report.discarded, 3);
    assert_eq!(report.source_errors, 1);
    assert_eq!(report.from_cache, 0);
    assert_eq!(report.records.len(), 1);

    let r = &report.records[0];
    assert_eq!(r.country, "United States");
    assert_eq!(r.age_days, Some(2.0));
    assert_eq!(r.importance_raw, 3);
}

#[tokio::test]
async fn empty_country_list_keeps_everyone() {
    let sources: Vec<Box<dyn RecordSource>> = vec![calendar()];
    let report = collect_pool(&sources, None, &[], t0()).await.unwrap();
    assert_eq!(report.discarded, 2);
    assert_eq!(report.records.len(), 2);
}

#[tokio::test]
async fn cache_extends_lookback_and_ages_rows() {
    let cache = MemoryCache::new();
    let live: Vec<Box<dyn RecordSource>> = vec![calendar()];
    let first = collect_pool(&live, Some(&cache), &wanted(), t0()).await.unwrap();
    assert_eq!(first.records.len(), 1);
    assert_eq!(cache.len(), 1);

    // next day the scraper returns nothing
    let quiet: Vec<Box<dyn RecordSource>> = vec![Box::new(StaticSource::new("calendar", vec![]))];
    let next = collect_pool(&quiet, Some(&cache), &wanted(), t0() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(next.from_cache, 1);
    assert_eq!(next.records[0].age_days, Some(3.0));

    // other countries never see it
    let other = collect_pool(&quiet, Some(&cache), &["Italy".to_string()], t0() + Duration::days(1))
        .await
        .unwrap();
    assert!(other.records.is_empty());

    // past the 30-day horizon but inside retention: kept, not loaded
    let late = collect_pool(&quiet, Some(&cache), &[], t0() + Duration::days(40))
        .await
        .unwrap();
    assert!(late.records.is_empty());
    assert_eq!(late.pruned, 0);
    assert_eq!(cache.len(), 1);

    // past retention: pruned
    let gone = collect_pool(&quiet, Some(&cache), &[], t0() + Duration::days(59))
        .await
        .unwrap();
    assert_eq!(gone.pruned, 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn json_snapshot_feeds_the_pool_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let snap = dir.path().join("cards.json");
    std::fs::write(
        &snap,
        r#"[
  {"country":"Italia","title":"Istat: l'inflazione &egrave; scesa all'1,6% annuo","time":"2 giorni fa","importance":3},
  {"country":"Germania","title":"<b>Germania</b>, la produzione industriale è salita dell'1,3% mensile","time":"ieri"}
]"#,
    )
    .unwrap();

    let cache_path = dir.path().join("cache").join("records.json");
    let cache = MemoryCache::open(&cache_path).unwrap();
    let sources: Vec<Box<dyn RecordSource>> = vec![
        Box::new(JsonFileSource::new(&snap)),
        Box::new(JsonFileSource::new(dir.path().join("missing.json"))),
    ];
    let report = collect_pool(&sources, Some(&cache), &[], t0()).await.unwrap();

    assert_eq!(report.source_errors, 1);
    assert_eq!(report.records.len(), 2);
    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert!(titles.contains(&"Istat: l'inflazione è scesa all'1,6% annuo"));
    assert!(titles.contains(&"Germania , la produzione industriale è salita dell'1,3% mensile"));
    assert!(report.records.iter().any(|r| r.country == "Italy"));

    // flushed to disk; a reopened cache sees the same rows
    assert!(cache_path.exists());
    let reopened = MemoryCache::open(&cache_path).unwrap();
    assert_eq!(reopened.len(), 2);
    let loaded = reopened.load(&["Germany".to_string()], 30.0, t0()).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].age_days, Some(1.0));
}
