//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define lifecycle, notification and channel metrics
//! - Expose a Prometheus-compatible endpoint when enabled
//!
//! # Metrics
//! - `mv_lifecycle_transitions_total` (counter): state entries by service, state
//! - `mv_notifications_total` (counter): records dispatched by service, kind
//! - `mv_notifications_discarded_total` (counter): records no state wanted
//! - `mv_notifications_dropped_total` (counter): records lost to a full ring
//! - `mv_disconnects_total` (counter): channels closed by a network drop
//! - `mv_setup_retries_total` (counter): retried acquisitions
//! - `mv_channel_bytes_written_total` (counter): bytes accepted by the provider
//! - `mv_log_bytes_lost_total` (counter): log bytes discarded while unavailable
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are the service name plus one enum label at most

use std::net::SocketAddr;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

use crate::lifecycle::LifecycleState;
use crate::notify::EventKind;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_metrics();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "mv_lifecycle_transitions_total",
        "Lifecycle state entries by service and state"
    );
    describe_counter!(
        "mv_notifications_total",
        "Notification records dispatched by service and kind"
    );
    describe_counter!(
        "mv_notifications_discarded_total",
        "Notification records no lifecycle state accepted"
    );
    describe_counter!(
        "mv_notifications_dropped_total",
        "Notification records dropped because the ring was full"
    );
    describe_counter!(
        "mv_disconnects_total",
        "Channels closed because the network or channel dropped"
    );
    describe_counter!("mv_setup_retries_total", "Channel setup attempts that were retried");
    describe_counter!(
        "mv_channel_bytes_written_total",
        "Bytes accepted by the provider on channel writes"
    );
    describe_counter!(
        "mv_log_bytes_lost_total",
        "Log bytes discarded because the log channel was unavailable"
    );
}

pub fn record_transition(service: &str, state: LifecycleState) {
    counter!(
        "mv_lifecycle_transitions_total",
        "service" => service.to_string(),
        "state" => state.label()
    )
    .increment(1);
}

pub fn record_notification(service: &str, kind: EventKind) {
    counter!(
        "mv_notifications_total",
        "service" => service.to_string(),
        "kind" => kind.label()
    )
    .increment(1);
}

pub fn record_notification_discarded(service: &str) {
    counter!("mv_notifications_discarded_total", "service" => service.to_string()).increment(1);
}

pub fn record_notification_dropped() {
    counter!("mv_notifications_dropped_total").increment(1);
}

pub fn record_disconnect(service: &str) {
    counter!("mv_disconnects_total", "service" => service.to_string()).increment(1);
}

pub fn record_setup_retry(service: &str) {
    counter!("mv_setup_retries_total", "service" => service.to_string()).increment(1);
}

pub fn record_bytes_written(service: &str, bytes: usize) {
    counter!("mv_channel_bytes_written_total", "service" => service.to_string())
        .increment(bytes as u64);
}

pub fn record_log_bytes_lost(bytes: usize) {
    counter!("mv_log_bytes_lost_total").increment(bytes as u64);
}
