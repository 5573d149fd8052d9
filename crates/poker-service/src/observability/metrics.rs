//! Prometheus metrics for the poker service.
//!
//! All metrics use the `poker_` prefix, `_total` for counters and
//! `_seconds` for duration histograms.
//!
//! # Cardinality
//!
//! - `command`: 8 values (client command types)
//! - `outcome`: 3 values (applied, ignored, rejected)
//! - `event`: 6 values (server event types)
//! - `endpoint`: 7 values (known routes plus `/other`)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

fn builder() -> Result<PrometheusBuilder, String> {
    PrometheusBuilder::new()
        // Commands are in-memory mutations; expect sub-millisecond handling
        .set_buckets_for_metric(
            Matcher::Prefix("poker_command".to_string()),
            &[
                0.000_05, 0.000_1, 0.000_25, 0.000_5, 0.001, 0.005, 0.010, 0.050, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set command duration buckets: {e}"))
}

/// Install the global Prometheus recorder and return its handle.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    builder()?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Build a recorder handle without installing it globally.
///
/// Used where several servers share one process (integration tests). The
/// returned handle renders an empty exposition.
///
/// # Errors
///
/// Returns error if bucket configuration is rejected.
pub fn detached_handle() -> Result<PrometheusHandle, String> {
    Ok(builder()?.build_recorder().handle())
}

/// Metric: `poker_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("poker_rooms_active").set(count as f64);
}

/// Metric: `poker_connections_active`
pub fn set_connections_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("poker_connections_active").set(count as f64);
}

/// Metric: `poker_controller_mailbox_depth`
pub fn set_controller_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("poker_controller_mailbox_depth").set(depth as f64);
}

/// Record a handled client command.
///
/// Metrics: `poker_commands_total`, `poker_command_duration_seconds`
/// Labels: `command`, `outcome`
pub fn record_command(command: &'static str, outcome: &'static str, duration: Duration) {
    counter!("poker_commands_total", "command" => command, "outcome" => outcome).increment(1);
    histogram!("poker_command_duration_seconds", "command" => command)
        .record(duration.as_secs_f64());
}

/// Metric: `poker_events_published_total`
pub fn record_event_published(event: &'static str) {
    counter!("poker_events_published_total", "event" => event).increment(1);
}

/// Metric: `poker_events_dropped_total`
pub fn record_event_dropped(event: &'static str) {
    counter!("poker_events_dropped_total", "event" => event).increment(1);
}

/// Metric: `poker_connections_evicted_total`
pub fn record_connection_evicted() {
    counter!("poker_connections_evicted_total").increment(1);
}

/// Metric: `poker_malformed_frames_total`
pub fn record_malformed_frame() {
    counter!("poker_malformed_frames_total").increment(1);
}

/// Record an HTTP request.
///
/// Metrics: `poker_http_requests_total`, `poker_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, path: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(path);
    let status = categorize_status_code(status_code);

    histogram!("poker_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("poker_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 | 101 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Collapse request paths to a fixed label set.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/ws" => "/ws",
        "/api/v1/rooms" => "/api/v1/rooms",
        _ => match path.strip_prefix("/api/v1/rooms/") {
            Some(rest) if !rest.is_empty() && !rest.contains('/') => "/api/v1/rooms/{room_id}",
            _ => "/other",
        },
    }
}
