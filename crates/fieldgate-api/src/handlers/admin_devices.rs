// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Admin handlers for device configuration rows.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use fieldgate_store::{DeviceCreate, DeviceRecord, DeviceUpdate};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /api/admin/devices` — every device row, soft-deleted included.
pub async fn admin_list_devices(State(state): State<AppState>) -> ApiResult<Json<Vec<DeviceRecord>>> {
    Ok(Json(state.device_store.list_devices().await?))
}

/// `GET /api/admin/devices/active` — active rows only.
pub async fn admin_list_active_devices(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DeviceRecord>>> {
    Ok(Json(state.device_store.list_active_devices().await?))
}

/// `GET /api/admin/devices/{device_id}`
pub async fn admin_get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceRecord>> {
    state
        .device_store
        .get_device(&device_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("device '{device_id}'")))
}

/// `POST /api/admin/devices` — 201 on success, 409 on duplicate id.
pub async fn admin_create_device(
    State(state): State<AppState>,
    Json(create): Json<DeviceCreate>,
) -> ApiResult<(StatusCode, Json<DeviceRecord>)> {
    let framer = create.validate().map_err(ApiError)?;

    if state.device_store.get_device(&create.device_id).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "device '{}' already exists",
            create.device_id
        )));
    }

    let record = state
        .device_store
        .create_device(create, framer.as_str().to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `PUT /api/admin/devices/{device_id}`
pub async fn admin_update_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(update): Json<DeviceUpdate>,
) -> ApiResult<Json<DeviceRecord>> {
    let framer = update.validate().map_err(ApiError)?;

    state
        .device_store
        .update_device(&device_id, update, framer)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("device '{device_id}'")))
}

/// `DELETE /api/admin/devices/{device_id}` — soft delete, 204.
pub async fn admin_delete_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.device_store.deactivate_device(&device_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("device '{device_id}'")))
    }
}

/// `POST /api/admin/devices/{device_id}/activate`
pub async fn admin_activate_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceRecord>> {
    if !state.device_store.activate_device(&device_id).await? {
        return Err(ApiError::not_found(format!("device '{device_id}'")));
    }
    state
        .device_store
        .get_device(&device_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("device '{device_id}'")))
}

/// Response of the reload endpoint.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Human-readable summary.
    pub message: String,
    /// Ids of the devices now managed.
    pub devices: Vec<String>,
}

/// `POST /api/admin/devices/reload` — rebuild the manager's device map from
/// the database; gateways that lose their last device are closed.
pub async fn admin_reload_devices(
    State(state): State<AppState>,
) -> ApiResult<Json<ReloadResponse>> {
    let rows = state.device_store.list_active_devices().await?;

    let mut configs = Vec::with_capacity(rows.len());
    for row in rows {
        match row.to_config() {
            Ok(config) => configs.push(config),
            Err(error) => {
                tracing::warn!(device_id = %row.device_id, error = %error, "skipping invalid device row during reload");
            }
        }
    }

    let mut devices: Vec<String> = configs
        .iter()
        .map(|cfg| cfg.device_id.to_string())
        .collect();
    devices.sort();

    state.manager.reload(configs).await;

    Ok(Json(ReloadResponse {
        status: "ok",
        message: format!("reloaded {} device(s)", devices.len()),
        devices,
    }))
}
