//! Session bootstrap endpoints.

use crate::server::DropRelay;
use axum::extract::{ConnectInfo, Path};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use drop_types::SessionToken;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Body of `201 Created`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    /// Token both peers use to join.
    pub id: SessionToken,
}

/// `POST /sessions`
pub async fn create_handler(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(relay): Extension<Arc<DropRelay>>,
) -> Response {
    if let Err(e) = relay.rate_limits().check_session(addr.ip()) {
        tracing::warn!("Session creation rate limited for {}: {}", addr, e);
        relay.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
        return (StatusCode::TOO_MANY_REQUESTS, e.to_string()).into_response();
    }

    let id = relay.create_session();
    (StatusCode::CREATED, Json(SessionCreated { id })).into_response()
}

/// `GET /sessions/{id}`
pub async fn show_handler(
    Path(id): Path<String>,
    Extension(relay): Extension<Arc<DropRelay>>,
) -> Response {
    let Ok(token) = SessionToken::parse(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match relay.session_view(&token).await {
        Some(view) => Json(view).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
