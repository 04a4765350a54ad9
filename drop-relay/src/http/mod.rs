//! HTTP endpoints for drop-relay.
//!
//! Provides session bootstrap, the WebSocket upgrade, health checks and
//! metrics.

mod health;
mod metrics;
mod sessions;

use crate::protocol::ws_handler;
use crate::server::DropRelay;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use health::HealthStatus;
pub use sessions::SessionCreated;

/// Build the HTTP router with all endpoints.
///
/// The WebSocket is served at `/ws` and at `/`, where browser clients
/// built against the bare host connect.
pub fn build_router(relay: Arc<DropRelay>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/sessions", post(sessions::create_handler))
        .route("/sessions/:id", get(sessions::show_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(Extension(relay))
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve(
    relay: Arc<DropRelay>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::error::Result<()> {
    let app = build_router(relay).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
