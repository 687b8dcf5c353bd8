// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::select::SelectionResult;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        crate::ingest::ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Counters for one served selection. Kept outside the selector, which stays pure.
pub fn record_selection(result: &SelectionResult) {
    crate::ingest::ensure_metrics_described();
    counter!("select_runs_total").increment(1);
    gauge!("select_output_size").set(result.len() as f64);
    for p in &result.phases {
        counter!("select_phase_runs_total", "phase" => p.phase.as_str()).increment(1);
    }
}
