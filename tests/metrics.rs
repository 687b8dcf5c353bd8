// tests/metrics.rs
// One test per binary: the Prometheus recorder can only be installed once.
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use macro_digest::api::{self, AppState};
use macro_digest::cache::MemoryCache;
use macro_digest::config::CapConfig;
use macro_digest::metrics::Metrics;
use macro_digest::taxonomy::{Taxonomy, TaxonomyHandle};

#[tokio::test]
async fn selection_shows_up_in_exposition() {
    let metrics = Metrics::init().expect("recorder installs once");
    assert!(Metrics::init().is_err(), "second install must fail");

    let state = AppState::new(
        TaxonomyHandle::new(Taxonomy::builtin()),
        CapConfig::default(),
        MemoryCache::new(),
    );
    let app = api::router(state).merge(metrics.router());

    let payload = r#"{"now":"2025-10-15T12:00:00Z","cards":[
        {"country":"Japan","title":"Japan GDP Growth Rate 0.5% QoQ","time":"3 hours ago","importance":3}
    ]}"#;
    let resp = app
        .clone()
        .oneshot(
            Request::post("/select")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "select_runs_total",
        "select_output_size",
        "select_phase_runs_total{phase=\"primary\"}",
        "ingest_records_total",
        "ingest_pool_size",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
