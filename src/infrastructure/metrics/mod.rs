//! Prometheus Metrics Module
//!
//! Application-wide metrics for the coordination layer.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauge
//! - Inbound gateway events by name
//! - Messages delivered to live connections
//! - Notifications created by type
//! - Call outcomes by terminal status

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections gauge
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "ws_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace("realtime_server"),
    )
    .expect("Failed to create WS_CONNECTIONS_ACTIVE metric")
});

/// Inbound gateway event counter by event name
pub static GATEWAY_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gateway_events_total", "Inbound gateway events by name")
            .namespace("realtime_server"),
        &["event"],
    )
    .expect("Failed to create GATEWAY_EVENTS_TOTAL metric")
});

/// Messages delivered to live recipient connections
pub static MESSAGES_DELIVERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "messages_delivered_total",
            "Message events delivered to live connections",
        )
        .namespace("realtime_server"),
    )
    .expect("Failed to create MESSAGES_DELIVERED_TOTAL metric")
});

/// Notifications created, by type
pub static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("notifications_total", "Notifications created by type")
            .namespace("realtime_server"),
        &["type"],
    )
    .expect("Failed to create NOTIFICATIONS_TOTAL metric")
});

/// Finished calls, by terminal status
pub static CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("calls_total", "Finished calls by terminal status")
            .namespace("realtime_server"),
        &["status"],
    )
    .expect("Failed to create CALLS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WS_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(GATEWAY_EVENTS_TOTAL.clone()))
        .expect("Failed to register GATEWAY_EVENTS_TOTAL");
    registry
        .register(Box::new(MESSAGES_DELIVERED_TOTAL.clone()))
        .expect("Failed to register MESSAGES_DELIVERED_TOTAL");
    registry
        .register(Box::new(NOTIFICATIONS_TOTAL.clone()))
        .expect("Failed to register NOTIFICATIONS_TOTAL");
    registry
        .register(Box::new(CALLS_TOTAL.clone()))
        .expect("Failed to register CALLS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}

/// Record an inbound gateway event
pub fn record_gateway_event(event: &str) {
    GATEWAY_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Record delivered message events
pub fn record_messages_delivered(count: u64) {
    MESSAGES_DELIVERED_TOTAL.inc_by(count);
}

/// Record a created notification
pub fn record_notification(notification_type: &str) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[notification_type])
        .inc();
}

/// Record a call outcome
pub fn record_call_outcome(status: &str) {
    CALLS_TOTAL.with_label_values(&[status]).inc();
}
