//! Prometheus metrics endpoint.

use crate::server::DropRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<DropRelay>>) -> impl IntoResponse {
    let m = relay.metrics();

    // Gauges
    let sessions = relay.registry().len();
    let connections = m.connections_open.load(Ordering::Relaxed);
    let tracked_ips = relay.rate_limits().tracked_keys();

    // Counters
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let created = m.sessions_created.load(Ordering::Relaxed);
    let frames = m.frames_relayed.load(Ordering::Relaxed);
    let bytes = m.bytes_relayed.load(Ordering::Relaxed);
    let errors = m.protocol_errors.load(Ordering::Relaxed);
    let disconnects = m.disconnects.load(Ordering::Relaxed);
    let swept = m.sessions_swept.load(Ordering::Relaxed);
    let telemetry_failures = m.telemetry_failures.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP sealdrop_sessions_active Number of sessions in the registry
# TYPE sealdrop_sessions_active gauge
sealdrop_sessions_active {sessions}

# HELP sealdrop_connections_active Number of open WebSocket connections
# TYPE sealdrop_connections_active gauge
sealdrop_connections_active {connections}

# HELP sealdrop_rate_limit_tracked_ips IPs currently tracked by rate limiters
# TYPE sealdrop_rate_limit_tracked_ips gauge
sealdrop_rate_limit_tracked_ips {tracked_ips}

# HELP sealdrop_info Server information
# TYPE sealdrop_info gauge
sealdrop_info{{version="{version}"}} 1

# HELP sealdrop_connections_total Total WebSocket connections accepted
# TYPE sealdrop_connections_total counter
sealdrop_connections_total {conns_total}

# HELP sealdrop_sessions_created_total Total sessions created
# TYPE sealdrop_sessions_created_total counter
sealdrop_sessions_created_total {created}

# HELP sealdrop_frames_relayed_total Total data frames forwarded
# TYPE sealdrop_frames_relayed_total counter
sealdrop_frames_relayed_total {frames}

# HELP sealdrop_bytes_relayed_total Total data frame bytes forwarded
# TYPE sealdrop_bytes_relayed_total counter
sealdrop_bytes_relayed_total {bytes}

# HELP sealdrop_protocol_errors_total Total messages answered with ERROR
# TYPE sealdrop_protocol_errors_total counter
sealdrop_protocol_errors_total {errors}

# HELP sealdrop_disconnects_total Total role bindings released by closed transports
# TYPE sealdrop_disconnects_total counter
sealdrop_disconnects_total {disconnects}

# HELP sealdrop_sessions_swept_total Total sessions deleted by the sweep
# TYPE sealdrop_sessions_swept_total counter
sealdrop_sessions_swept_total {swept}

# HELP sealdrop_telemetry_failures_total Total failed telemetry writes
# TYPE sealdrop_telemetry_failures_total counter
sealdrop_telemetry_failures_total {telemetry_failures}

# HELP sealdrop_rate_limit_hits_total Total rate limit rejections
# TYPE sealdrop_rate_limit_hits_total counter
sealdrop_rate_limit_hits_total {rate_limits}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
