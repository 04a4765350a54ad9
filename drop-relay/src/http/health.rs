//! `GET /health`

use crate::registry::SessionState;
use crate::server::DropRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Liveness report for load balancers and operators.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Always `"ok"` while the relay answers.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Open WebSocket connections.
    pub connections: u64,
    /// Sessions in the registry.
    pub sessions: usize,
    /// Sessions with a chunk forwarded and no EOF or CANCEL yet.
    pub transferring: usize,
    /// Seconds since the relay started.
    pub uptime_seconds: u64,
}

impl HealthStatus {
    /// Snapshot the relay.
    pub async fn of(relay: &DropRelay) -> Self {
        let mut transferring = 0;
        for (_, record) in relay.registry().snapshot() {
            if record.lock().await.state() == SessionState::Transferring {
                transferring += 1;
            }
        }
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            connections: relay.metrics().connections_open.load(Ordering::Relaxed),
            sessions: relay.registry().len(),
            transferring,
            uptime_seconds: relay.uptime().as_secs(),
        }
    }
}

pub(super) async fn health_handler(Extension(relay): Extension<Arc<DropRelay>>) -> Json<HealthStatus> {
    Json(HealthStatus::of(&relay).await)
}
