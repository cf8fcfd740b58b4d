//! Devwatch REST API
//!
//! HTTP API layer, built with Axum. Every handler talks to the engine through
//! its handle; nothing here touches tracker state directly.
//!
//! # Endpoints
//!
//! ## Tokens
//! - `GET /api/v1/status` - Feed state, SOL price, counts
//! - `GET /api/v1/panels/:panel` - One panel's cards
//! - `GET /api/v1/tokens` - All tracked tokens
//! - `DELETE /api/v1/tokens` - Clear tracked tokens
//! - `DELETE /api/v1/tokens/:mint` - Remove one token
//! - `POST /api/v1/refresh` - Reconcile panels now
//!
//! ## Devs
//! - `GET|POST|DELETE /api/v1/devs`
//! - `DELETE /api/v1/devs/:id`
//! - `POST /api/v1/devs/:id/follow`, `/edit`, `/sync`
//! - `POST /api/v1/devs/sync`
//! - `GET /api/v1/devs/profile/:address`
//! - `GET /api/v1/devs/export`, `POST /api/v1/devs/import`
//!
//! ## Settings
//! - `PUT|DELETE /api/v1/filters/:panel`
//! - `PUT /api/v1/chart-provider`, `POST /api/v1/chart-provider/toggle`
//! - `GET /api/v1/settings/export`, `POST /api/v1/settings/import`
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /api/v1/ws` - Dashboard streaming connection

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::websocket::websocket_handler;

/// Settings bundles carry the full token set
const MAX_IMPORT_BYTES: usize = 16 * 1024 * 1024;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();

    let api_routes = Router::new()
        // Token routes
        .route("/status", get(routes::tokens::status))
        .route("/panels/:panel", get(routes::tokens::get_panel))
        .route(
            "/tokens",
            get(routes::tokens::list_tokens).delete(routes::tokens::clear_tokens),
        )
        .route("/tokens/:mint", delete(routes::tokens::remove_token))
        .route("/refresh", post(routes::tokens::refresh))
        // Dev routes
        .route(
            "/devs",
            get(routes::devs::list_devs)
                .post(routes::devs::add_dev)
                .delete(routes::devs::clear_devs),
        )
        .route("/devs/sync", post(routes::devs::sync_all))
        .route("/devs/export", get(routes::devs::export_devs))
        .route("/devs/import", post(routes::devs::import_devs))
        .route("/devs/profile/:address", get(routes::devs::dev_profile))
        .route("/devs/:id", delete(routes::devs::remove_dev))
        .route("/devs/:id/follow", post(routes::devs::toggle_follow))
        .route("/devs/:id/edit", post(routes::devs::edit_dev))
        .route("/devs/:id/sync", post(routes::devs::sync_dev))
        // Settings routes
        .route(
            "/filters/:panel",
            put(routes::settings::set_filter).delete(routes::settings::reset_filter),
        )
        .route("/chart-provider", put(routes::settings::set_chart_provider))
        .route(
            "/chart-provider/toggle",
            post(routes::settings::toggle_chart_provider),
        )
        .route("/settings/export", get(routes::settings::export_settings))
        .route("/settings/import", post(routes::settings::import_settings))
        .layer(DefaultBodyLimit::max(MAX_IMPORT_BYTES))
        .layer(TimeoutLayer::new(timeout))
        // WebSocket route, outside the request timeout
        .route("/ws", get(websocket_handler));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<(), ApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Devwatch API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Devwatch API shut down gracefully");
    Ok(())
}
