//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by method, status
//! - `edge_request_duration_seconds` (histogram): end-to-end latency
//! - `addons_transform_total` (counter): transform decisions by mode
//! - `addons_transform_fallback_total` (counter): recovered failures by mode, reason
//! - `addons_transform_duration_seconds` (histogram): successful transform time by mode
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed, so tests need no setup

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::transform::TransformMode;

/// Install the Prometheus exporter with its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "edge_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("edge_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_transform_decision(mode: TransformMode) {
    counter!("addons_transform_total", "mode" => mode.as_str()).increment(1);
}

pub fn record_transform_duration(mode: TransformMode, start: Instant) {
    histogram!("addons_transform_duration_seconds", "mode" => mode.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_transform_fallback(mode: TransformMode, reason: &'static str) {
    counter!(
        "addons_transform_fallback_total",
        "mode" => mode.as_str(),
        "reason" => reason
    )
    .increment(1);
}
