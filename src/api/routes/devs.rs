//! Dev Routes
//!
//! - GET /api/v1/devs - List devs with sync state
//! - POST /api/v1/devs - Add a dev
//! - DELETE /api/v1/devs - Remove every dev
//! - DELETE /api/v1/devs/:id - Remove a dev (its tokens stay tracked)
//! - POST /api/v1/devs/:id/follow - Toggle following
//! - POST /api/v1/devs/:id/edit - Remove a dev and return its form prefill
//! - POST /api/v1/devs/:id/sync - Re-send one dev's subscription
//! - POST /api/v1/devs/sync - Re-send every followed dev's subscription
//! - GET /api/v1/devs/profile/:address - Dev details for an address
//! - GET /api/v1/devs/export - Dev list as JSON
//! - POST /api/v1/devs/import - Merge a JSON array of devs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{
    AddDevRequest, CountResponse, DevListResponse, DevResponse, EditDevResponse,
    ImportDevsResponse, SyncResponse,
};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::tracker::{settings, Dev, DevProfile, TrackerError};

/// GET /api/v1/devs
pub async fn list_devs(State(state): State<Arc<AppState>>) -> ApiResult<Json<DevListResponse>> {
    let devs = state.engine.query(|tracker, _| tracker.dev_summaries()).await?;
    Ok(Json(DevListResponse {
        total: devs.len(),
        devs,
    }))
}

/// POST /api/v1/devs
pub async fn add_dev(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddDevRequest>,
) -> ApiResult<(StatusCode, Json<DevResponse>)> {
    let dev = state
        .engine
        .try_mutate(move |tracker, now| tracker.add_dev(req, now))
        .await??;

    Ok((StatusCode::CREATED, Json(DevResponse { dev })))
}

/// DELETE /api/v1/devs
pub async fn clear_devs(State(state): State<Arc<AppState>>) -> ApiResult<Json<CountResponse>> {
    let count = state.engine.mutate(|tracker, _| tracker.clear_devs()).await?;
    Ok(Json(CountResponse { count }))
}

/// DELETE /api/v1/devs/:id
pub async fn remove_dev(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DevResponse>> {
    let dev = state
        .engine
        .try_mutate(move |tracker, _| tracker.remove_dev(&id))
        .await??;

    Ok(Json(DevResponse { dev }))
}

/// POST /api/v1/devs/:id/follow
pub async fn toggle_follow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DevResponse>> {
    let dev = state
        .engine
        .try_mutate(move |tracker, _| tracker.toggle_follow(&id))
        .await??;
    Ok(Json(DevResponse { dev }))
}

/// POST /api/v1/devs/:id/edit
///
/// The dev is removed; resubmitting the draft through `POST /devs` re-adds it.
pub async fn edit_dev(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<EditDevResponse>> {
    let draft = state
        .engine
        .try_mutate(move |tracker, _| tracker.edit_dev(&id))
        .await??;
    Ok(Json(EditDevResponse { draft }))
}

/// POST /api/v1/devs/:id/sync
pub async fn sync_dev(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SyncResponse>> {
    let sync_state = state
        .engine
        .try_mutate(move |tracker, _| tracker.sync_dev(&id))
        .await??;
    Ok(Json(SyncResponse { sync_state }))
}

/// POST /api/v1/devs/sync
pub async fn sync_all(State(state): State<Arc<AppState>>) -> ApiResult<Json<CountResponse>> {
    let count = state
        .engine
        .try_mutate(|tracker, _| tracker.sync_all())
        .await??;
    Ok(Json(CountResponse { count }))
}

/// GET /api/v1/devs/profile/:address
pub async fn dev_profile(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<DevProfile>> {
    let lookup = address.clone();
    let profile = state
        .engine
        .query(move |tracker, _| tracker.dev_profile(&lookup))
        .await?
        .ok_or(TrackerError::DevNotFound(address))?;
    Ok(Json(profile))
}

/// GET /api/v1/devs/export
pub async fn export_devs(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Dev>>> {
    let devs = state.engine.query(|tracker, _| tracker.export_devs()).await?;
    Ok(Json(devs))
}

/// POST /api/v1/devs/import
///
/// Body is a JSON array of devs. Devs whose address is already present are
/// skipped.
pub async fn import_devs(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<Json<ImportDevsResponse>> {
    let devs = settings::parse_dev_list(&body)?;
    let counts = state
        .engine
        .mutate(move |tracker, now| tracker.import_devs(devs, now))
        .await?;

    Ok(Json(counts.into()))
}
