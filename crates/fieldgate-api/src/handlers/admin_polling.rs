// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Admin handlers for polling-target rows.
//!
//! The poller reloads its target set from the database on every cycle, so
//! mutations here take effect without any push; the reload endpoint exists
//! for operator ergonomics and only acknowledges.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use fieldgate_store::{PollingTargetCreate, PollingTargetRecord, PollingTargetUpdate};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /api/admin/polling` — every target row, soft-deleted included.
pub async fn admin_list_targets(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PollingTargetRecord>>> {
    Ok(Json(state.polling_store.list_targets().await?))
}

/// `GET /api/admin/polling/active` — active rows only.
pub async fn admin_list_active_targets(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PollingTargetRecord>>> {
    Ok(Json(state.polling_store.list_active_targets().await?))
}

/// `GET /api/admin/polling/device/{device_id}` — active targets of one device.
pub async fn admin_list_targets_for_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Vec<PollingTargetRecord>>> {
    Ok(Json(
        state.polling_store.list_targets_for_device(&device_id).await?,
    ))
}

/// `GET /api/admin/polling/{target_id}`
pub async fn admin_get_target(
    State(state): State<AppState>,
    Path(target_id): Path<i64>,
) -> ApiResult<Json<PollingTargetRecord>> {
    state
        .polling_store
        .get_target(target_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("polling target {target_id}")))
}

/// `POST /api/admin/polling` — 201; validates the range and that the device
/// exists (application-level foreign key).
pub async fn admin_create_target(
    State(state): State<AppState>,
    Json(create): Json<PollingTargetCreate>,
) -> ApiResult<(StatusCode, Json<PollingTargetRecord>)> {
    let register_type = create.validate().map_err(ApiError)?;

    if state.device_store.get_device(&create.device_id).await?.is_none() {
        return Err(ApiError::not_found(format!("device '{}'", create.device_id)));
    }

    let record = state
        .polling_store
        .create_target(create, register_type.as_str().to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /api/admin/polling/{target_id}`
pub async fn admin_update_target(
    State(state): State<AppState>,
    Path(target_id): Path<i64>,
    Json(update): Json<PollingTargetUpdate>,
) -> ApiResult<Json<PollingTargetRecord>> {
    let register_type = update.validate().map_err(ApiError)?;

    state
        .polling_store
        .update_target(target_id, update, register_type)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("polling target {target_id}")))
}

/// `DELETE /api/admin/polling/{target_id}` — soft delete, 204.
pub async fn admin_delete_target(
    State(state): State<AppState>,
    Path(target_id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.polling_store.deactivate_target(target_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("polling target {target_id}")))
    }
}

/// `POST /api/admin/polling/{target_id}/activate`
pub async fn admin_activate_target(
    State(state): State<AppState>,
    Path(target_id): Path<i64>,
) -> ApiResult<Json<PollingTargetRecord>> {
    if !state.polling_store.activate_target(target_id).await? {
        return Err(ApiError::not_found(format!("polling target {target_id}")));
    }
    state
        .polling_store
        .get_target(target_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("polling target {target_id}")))
}

/// Response of the polling reload acknowledgement.
#[derive(Debug, Serialize)]
pub struct PollingReloadResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Human-readable summary.
    pub message: &'static str,
}

/// `POST /api/admin/polling/reload` — acknowledgement only; the poller picks
/// up changes on its next cycle.
pub async fn admin_reload_targets() -> Json<PollingReloadResponse> {
    Json(PollingReloadResponse {
        status: "ok",
        message: "polling targets are reloaded automatically on the next cycle",
    })
}
