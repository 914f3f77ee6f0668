//! Prometheus metrics exposition
//!
//! Gateway-level metrics:
//!
//! - `gateway_requests_total` (counter): labels `route`, `status`
//! - `gateway_request_duration_seconds` (histogram): label `route`
//!
//! The feed crate additionally emits `feed_cache_hits_total`,
//! `feed_upstream_fetches_total` and `feed_upstream_errors_total`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `gateway_request_duration_seconds` with histogram buckets so it
/// renders as a Prometheus histogram rather than the default summary. The
/// handle's `render()` method produces the text exposition format served on
/// the `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "gateway_request_duration_seconds".to_string(),
            ),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed gateway request with route and status labels.
pub fn record_request(route: &'static str, status: u16, duration_secs: f64) {
    metrics::counter!("gateway_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(duration_secs);
}
