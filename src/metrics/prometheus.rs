use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::market_data::types::FetchMode;

/// Start the Prometheus HTTP exporter on the given port.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are automatically exported at /metrics.
pub fn init_metrics_server(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(())
}

// ── Fetch metrics ────────────────────────────────────────────────

pub fn record_fetch(mode: FetchMode, outcome: &'static str) {
    counter!("market_fetch_total", "mode" => mode.as_str(), "outcome" => outcome).increment(1);
}

pub fn record_fetch_latency(mode: FetchMode, latency_ms: f64) {
    histogram!("market_fetch_latency_ms", "mode" => mode.as_str()).record(latency_ms);
}

// ── Governor metrics ─────────────────────────────────────────────

/// A request landed inside the minimum interval and was parked on a timer.
pub fn record_deferred(mode: FetchMode) {
    counter!("market_fetch_deferred_total", "mode" => mode.as_str()).increment(1);
}

/// A request arrived while another fetch was in flight and was dropped.
pub fn record_dropped(mode: FetchMode) {
    counter!("market_fetch_dropped_total", "mode" => mode.as_str()).increment(1);
}

pub fn record_stale_discarded() {
    counter!("market_fetch_stale_total").increment(1);
}

// ── Store metrics ────────────────────────────────────────────────

pub fn record_snapshot_write(outcome: &'static str) {
    counter!("market_snapshot_writes_total", "outcome" => outcome).increment(1);
}

pub fn record_records_loaded(count: usize) {
    gauge!("market_records_loaded").set(count as f64);
}
