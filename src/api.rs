// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::analyze::annotate;
use crate::cache::{CacheStore, MemoryCache};
use crate::config::{load_caps_default, CapConfig};
use crate::ingest::providers::StaticSource;
use crate::ingest::types::RecordSource;
use crate::ingest::{card_to_record, collect_pool, PoolReport};
use crate::record::{AnnotatedRecord, RawRecord, ScrapedCard};
use crate::select::{SelectionResult, Selector};
use crate::taxonomy::{Taxonomy, TaxonomyHandle};

pub const ENV_CACHE_PATH: &str = "DIGEST_CACHE_PATH";
pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_MIN_TARGET: usize = 12;

#[derive(Clone)]
pub struct AppState {
    pub taxonomy: TaxonomyHandle,
    pub caps: Arc<CapConfig>,
    pub cache: Arc<MemoryCache>,
}

impl AppState {
    pub fn new(taxonomy: TaxonomyHandle, caps: CapConfig, cache: MemoryCache) -> Self {
        Self {
            taxonomy,
            caps: Arc::new(caps),
            cache: Arc::new(cache),
        }
    }

    /// Taxonomy and caps from their config files (falling back to built-ins),
    /// cache from `$DIGEST_CACHE_PATH` or in-memory only.
    pub fn from_env() -> Self {
        let taxonomy = TaxonomyHandle::new(Taxonomy::load_or_builtin());
        let caps = load_caps_default().unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "select config invalid; using defaults");
            CapConfig::default()
        });
        let cache = match std::env::var(ENV_CACHE_PATH) {
            Ok(p) => MemoryCache::open(&p).unwrap_or_else(|e| {
                tracing::warn!(target: "cache", error = ?e, path = %p, "cache unreadable");
                MemoryCache::new()
            }),
            Err(_) => MemoryCache::new(),
        };
        Self::new(taxonomy, caps, cache)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/classify", post(classify))
        .route("/select", post(select_cards))
        .route("/cache/upsert", post(cache_upsert))
        .route("/cache/select", get(cache_select))
        .route("/debug/taxonomy", get(debug_taxonomy))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

fn internal(e: anyhow::Error) -> ApiError {
    tracing::warn!(error = ?e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
}

#[derive(Deserialize)]
struct ClassifyReq {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    age_days: f64,
    #[serde(default)]
    importance: u8,
}

async fn classify(
    State(state): State<AppState>,
    Json(body): Json<ClassifyReq>,
) -> Result<Json<AnnotatedRecord>, ApiError> {
    let raw = RawRecord::new(&body.country, &body.title, &body.description, body.age_days)
        .with_importance(body.importance);
    let tax = state.taxonomy.snapshot();
    annotate(&tax, &raw).map(Json).ok_or((
        StatusCode::UNPROCESSABLE_ENTITY,
        "age_days must be a finite, non-negative number".to_string(),
    ))
}

#[derive(Deserialize)]
struct SelectReq {
    #[serde(default)]
    cards: Vec<ScrapedCard>,
    #[serde(default)]
    window_days: Option<u32>,
    #[serde(default)]
    min_target: Option<usize>,
    #[serde(default)]
    countries: Vec<String>,
    #[serde(default)]
    caps: Option<CapConfig>,
    /// Join cached records and upsert the posted cards.
    #[serde(default)]
    use_cache: bool,
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct PoolStats {
    fetched: usize,
    discarded: usize,
    from_cache: usize,
    pool: usize,
}

impl From<&PoolReport> for PoolStats {
    fn from(r: &PoolReport) -> Self {
        Self {
            fetched: r.fetched,
            discarded: r.discarded,
            from_cache: r.from_cache,
            pool: r.records.len(),
        }
    }
}

#[derive(Serialize)]
struct SelectResp {
    #[serde(flatten)]
    selection: SelectionResult,
    pool: PoolStats,
}

fn run_selection(
    state: &AppState,
    pool: &[RawRecord],
    caps: Option<&CapConfig>,
    window_days: u32,
    min_target: usize,
) -> SelectionResult {
    let tax = state.taxonomy.snapshot();
    let caps = caps.unwrap_or(state.caps.as_ref());
    let result = Selector::new(&tax, caps).run(pool, window_days, min_target);
    crate::metrics::record_selection(&result);
    result
}

async fn select_cards(
    State(state): State<AppState>,
    Json(body): Json<SelectReq>,
) -> Result<Json<SelectResp>, ApiError> {
    let now = body.now.unwrap_or_else(Utc::now);
    let sources: Vec<Box<dyn RecordSource>> =
        vec![Box::new(StaticSource::new("request", body.cards))];
    let cache: Option<&dyn CacheStore> = if body.use_cache {
        Some(state.cache.as_ref())
    } else {
        None
    };
    let report = collect_pool(&sources, cache, &body.countries, now)
        .await
        .map_err(internal)?;

    let selection = run_selection(
        &state,
        &report.records,
        body.caps.as_ref(),
        body.window_days.unwrap_or(DEFAULT_WINDOW_DAYS),
        body.min_target.unwrap_or(DEFAULT_MIN_TARGET),
    );
    Ok(Json(SelectResp {
        pool: PoolStats::from(&report),
        selection,
    }))
}

#[derive(Deserialize)]
struct UpsertReq {
    cards: Vec<ScrapedCard>,
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct UpsertResp {
    written: usize,
    discarded: usize,
    rows: usize,
}

async fn cache_upsert(
    State(state): State<AppState>,
    Json(body): Json<UpsertReq>,
) -> Result<Json<UpsertResp>, ApiError> {
    let now = body.now.unwrap_or_else(Utc::now);
    let records: Vec<RawRecord> = body
        .cards
        .iter()
        .filter_map(|c| card_to_record(c, now))
        .collect();
    let discarded = body.cards.len() - records.len();
    let written = state.cache.upsert(&records, now).map_err(internal)?;
    state.cache.flush().map_err(internal)?;
    Ok(Json(UpsertResp {
        written,
        discarded,
        rows: state.cache.len(),
    }))
}

#[derive(Deserialize)]
struct CacheSelectQuery {
    /// Comma-separated country names.
    #[serde(default)]
    countries: Option<String>,
    #[serde(default)]
    days: Option<u32>,
    #[serde(default)]
    min_target: Option<usize>,
}

async fn cache_select(
    State(state): State<AppState>,
    Query(q): Query<CacheSelectQuery>,
) -> Result<Json<SelectResp>, ApiError> {
    let countries: Vec<String> = q
        .countries
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    let cache: &dyn CacheStore = state.cache.as_ref();
    let report = collect_pool(&[], Some(cache), &countries, Utc::now())
        .await
        .map_err(internal)?;
    let selection = run_selection(
        &state,
        &report.records,
        None,
        q.days.unwrap_or(DEFAULT_WINDOW_DAYS),
        q.min_target.unwrap_or(DEFAULT_MIN_TARGET),
    );
    Ok(Json(SelectResp {
        pool: PoolStats::from(&report),
        selection,
    }))
}

#[derive(Serialize)]
struct TaxonomyInfo {
    rules: Vec<RuleInfo>,
    stopwords: usize,
    signature_tokens: usize,
    caps: CapConfig,
}

#[derive(Serialize)]
struct RuleInfo {
    id: String,
    category: String,
    base_weight: f64,
}

async fn debug_taxonomy(State(state): State<AppState>) -> Json<TaxonomyInfo> {
    let tax = state.taxonomy.snapshot();
    let rules = tax
        .category_rules()
        .iter()
        .map(|r| RuleInfo {
            id: r.id.clone(),
            category: r.label.to_string(),
            base_weight: tax.base_weight(r.label),
        })
        .collect();
    Json(TaxonomyInfo {
        rules,
        stopwords: tax.stopword_count(),
        signature_tokens: tax.signature_tokens(),
        caps: (*state.caps).clone(),
    })
}
