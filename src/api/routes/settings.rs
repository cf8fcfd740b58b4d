//! Settings Routes
//!
//! - PUT /api/v1/filters/:panel - Replace a panel's filter
//! - DELETE /api/v1/filters/:panel - Restore a panel's default filter
//! - PUT /api/v1/chart-provider - Select the chart site
//! - POST /api/v1/chart-provider/toggle - Switch between chart sites
//! - GET /api/v1/settings/export - Settings bundle
//! - POST /api/v1/settings/import - Apply a settings bundle

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ChartProviderRequest, ChartProviderResponse, FilterResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::tracker::{settings, ChartProvider, ImportSummary, PanelFilter, PanelId, SettingsBundle};

/// PUT /api/v1/filters/:panel
pub async fn set_filter(
    State(state): State<Arc<AppState>>,
    Path(panel): Path<String>,
    Json(filter): Json<PanelFilter>,
) -> ApiResult<Json<FilterResponse>> {
    let panel: PanelId = panel.parse()?;
    state
        .engine
        .try_mutate(move |tracker, now| Ok(((), tracker.set_filter(panel, filter, now)?)))
        .await??;
    Ok(Json(FilterResponse { panel, filter }))
}

/// DELETE /api/v1/filters/:panel
pub async fn reset_filter(
    State(state): State<Arc<AppState>>,
    Path(panel): Path<String>,
) -> ApiResult<Json<FilterResponse>> {
    let panel: PanelId = panel.parse()?;
    let filter = state
        .engine
        .mutate(move |tracker, now| {
            let effects = tracker.reset_filter(panel, now);
            (*tracker.filters().get(panel), effects)
        })
        .await?;
    Ok(Json(FilterResponse { panel, filter }))
}

/// PUT /api/v1/chart-provider
pub async fn set_chart_provider(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChartProviderRequest>,
) -> ApiResult<Json<ChartProviderResponse>> {
    let provider: ChartProvider = req.provider.parse()?;
    state
        .engine
        .mutate(move |tracker, _| ((), tracker.set_chart_provider(provider)))
        .await?;
    Ok(Json(provider.into()))
}

/// POST /api/v1/chart-provider/toggle
pub async fn toggle_chart_provider(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ChartProviderResponse>> {
    let provider = state
        .engine
        .mutate(|tracker, _| tracker.toggle_chart_provider())
        .await?;
    Ok(Json(provider.into()))
}

/// GET /api/v1/settings/export
pub async fn export_settings(State(state): State<Arc<AppState>>) -> ApiResult<Json<SettingsBundle>> {
    let bundle = state
        .engine
        .query(|tracker, now| tracker.export_settings(now))
        .await?;
    Ok(Json(bundle))
}

/// POST /api/v1/settings/import
///
/// Nothing changes when the document is unreadable or lacks `version`.
pub async fn import_settings(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<Json<ImportSummary>> {
    let document = settings::parse_settings(&body)?;
    let summary = state
        .engine
        .try_mutate(move |tracker, now| tracker.import_settings(document, now))
        .await??;
    Ok(Json(summary))
}
