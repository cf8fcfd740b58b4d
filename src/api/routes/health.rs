//! Health Routes
//!
//! Health check endpoints for monitoring and container probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (engine is processing commands)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 while the engine answers queries. A disconnected feed does not
/// make the daemon unready; it reconnects on its own.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.engine.query(|_, _| ()).await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let feed = state.engine.query(|tracker, _| tracker.feed_status()).await?;
    let status = if feed.is_connected() { "healthy" } else { "degraded" };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        feed,
        ws_connections: state.ws_connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        assert_eq!(liveness().await, StatusCode::OK);
    }
}
