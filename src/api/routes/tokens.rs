//! Token Routes
//!
//! - GET /api/v1/status - Connection state, SOL price and counts
//! - GET /api/v1/panels/:panel - Filtered, sorted cards for one panel
//! - GET /api/v1/tokens - Every tracked token, newest first
//! - DELETE /api/v1/tokens - Clear all tracked tokens
//! - DELETE /api/v1/tokens/:mint - Stop tracking one token
//! - POST /api/v1/refresh - Re-place every token on the panels

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CountResponse, PanelResponse, TokenCard, TokenListResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::tracker::{PanelId, StatusSnapshot};

/// GET /api/v1/status
pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<Json<StatusSnapshot>> {
    let snapshot = state.engine.query(|tracker, _| tracker.status()).await?;
    Ok(Json(snapshot))
}

/// GET /api/v1/panels/:panel
///
/// Accepts `new-launches`, `active-tokens`, `graduated` (or `new`/`active`).
pub async fn get_panel(
    State(state): State<Arc<AppState>>,
    Path(panel): Path<String>,
) -> ApiResult<Json<PanelResponse>> {
    let panel: PanelId = panel.parse()?;

    let response = state
        .engine
        .query(move |tracker, now| {
            let provider = tracker.chart_provider();
            let tokens: Vec<TokenCard> = tracker
                .panel(panel, now)
                .into_iter()
                .map(|token| TokenCard::new(token, provider, now))
                .collect();
            PanelResponse {
                panel,
                filter: *tracker.filters().get(panel),
                total: tokens.len(),
                tokens,
            }
        })
        .await?;

    Ok(Json(response))
}

/// GET /api/v1/tokens
pub async fn list_tokens(State(state): State<Arc<AppState>>) -> ApiResult<Json<TokenListResponse>> {
    let tokens = state.engine.query(|tracker, _| tracker.tokens()).await?;
    Ok(Json(TokenListResponse {
        total: tokens.len(),
        tokens,
    }))
}

/// DELETE /api/v1/tokens/:mint
pub async fn remove_token(
    State(state): State<Arc<AppState>>,
    Path(mint): Path<String>,
) -> ApiResult<Json<TokenCard>> {
    let (token, provider, now) = state
        .engine
        .try_mutate(move |tracker, now| {
            let provider = tracker.chart_provider();
            let (token, effects) = tracker.remove_token(&mint)?;
            Ok(((token, provider, now), effects))
        })
        .await??;

    Ok(Json(TokenCard::new(token, provider, now)))
}

/// DELETE /api/v1/tokens
pub async fn clear_tokens(State(state): State<Arc<AppState>>) -> ApiResult<Json<CountResponse>> {
    let count = state
        .engine
        .mutate(|tracker, _| tracker.clear_tokens())
        .await?;

    Ok(Json(CountResponse { count }))
}

/// POST /api/v1/refresh
///
/// Returns the number of card moves the reconciliation produced.
pub async fn refresh(State(state): State<Arc<AppState>>) -> ApiResult<Json<CountResponse>> {
    let count = state
        .engine
        .mutate(|tracker, now| {
            let effects = tracker.reconcile_all(now);
            (effects.len(), effects)
        })
        .await?;

    Ok(Json(CountResponse { count }))
}
