//! Prometheus Metrics Module
//!
//! Provides broker-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauge
//! - Inbound message counts by handler
//! - Reported errors by kind
//! - Broadcast delivery outcomes

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace("resource_broker"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Inbound message counter by handler
pub static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_total", "Total number of inbound messages routed")
            .namespace("resource_broker"),
        &["handler"],
    )
    .expect("Failed to create MESSAGES_TOTAL metric")
});

/// Reported error counter by kind
pub static ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("errors_total", "Total number of reported broker errors")
            .namespace("resource_broker"),
        &["kind"],
    )
    .expect("Failed to create ERRORS_TOTAL metric")
});

/// Broadcast delivery counter by outcome
pub static BROADCAST_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "broadcast_deliveries_total",
            "Per-connection broadcast outcomes",
        )
        .namespace("resource_broker"),
        &["outcome"], // "delivered", "skipped", "failed"
    )
    .expect("Failed to create BROADCAST_DELIVERIES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_TOTAL.clone()))
        .expect("Failed to register MESSAGES_TOTAL");
    registry
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("Failed to register ERRORS_TOTAL");
    registry
        .register(Box::new(BROADCAST_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register BROADCAST_DELIVERIES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to update the WebSocket connection count
pub fn set_websocket_connections(connected: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(connected as i64);
}

/// Helper to record a routed inbound message
pub fn record_message(handler: &str) {
    MESSAGES_TOTAL.with_label_values(&[handler]).inc();
}

/// Helper to record a reported error
pub fn record_error(kind: &str) {
    ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to record broadcast outcomes
pub fn record_broadcast(delivered: usize, skipped: usize, failed: usize) {
    BROADCAST_DELIVERIES_TOTAL
        .with_label_values(&["delivered"])
        .inc_by(delivered as u64);
    BROADCAST_DELIVERIES_TOTAL
        .with_label_values(&["skipped"])
        .inc_by(skipped as u64);
    BROADCAST_DELIVERIES_TOTAL
        .with_label_values(&["failed"])
        .inc_by(failed as u64);
}
