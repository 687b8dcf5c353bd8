//! Macro digest service: binary entrypoint.
//! Boots the Axum HTTP server with the selection routes, shared state and metrics.

use shuttle_axum::ShuttleAxum;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use macro_digest::api::{self, AppState};
use macro_digest::cache::CacheStore;
use macro_digest::ingest::{collect_pool, providers::JsonFileSource, types::RecordSource};
use macro_digest::metrics::Metrics;
use macro_digest::taxonomy::{
    start_hot_reload_thread, DEFAULT_TAXONOMY_CONFIG_PATH, ENV_TAXONOMY_CONFIG_PATH,
};

/// Scraper snapshot loaded into the cache at boot, if set.
const ENV_SNAPSHOT_PATH: &str = "DIGEST_SNAPSHOT_PATH";

/// Compact fmt layer filtered by RUST_LOG. A no-op when the runtime already
/// installed a global subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("selector=info,ingest=info,cache=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Feed the cache from a saved snapshot so the first selection has history.
async fn warm_cache(state: &AppState) {
    let Ok(path) = std::env::var(ENV_SNAPSHOT_PATH) else {
        return;
    };
    let sources: Vec<Box<dyn RecordSource>> = vec![Box::new(JsonFileSource::new(path))];
    let cache: &dyn CacheStore = state.cache.as_ref();
    match collect_pool(&sources, Some(cache), &[], chrono::Utc::now()).await {
        Ok(report) => tracing::info!(
            target: "ingest",
            pool = report.records.len(),
            "cache warmed from snapshot"
        ),
        Err(e) => tracing::warn!(target: "ingest", error = ?e, "cache warm-up failed"),
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let state = AppState::from_env();

    // If hot reload is enabled, spawn background watcher
    let path = std::env::var(ENV_TAXONOMY_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TAXONOMY_CONFIG_PATH));
    start_hot_reload_thread(state.taxonomy.clone(), path);

    // Recorder first, so series described during warm-up are kept.
    let metrics = Metrics::init()
        .map_err(|e| tracing::warn!(error = ?e, "metrics disabled"))
        .ok();

    warm_cache(&state).await;

    let mut router = api::router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
