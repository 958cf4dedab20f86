// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device data-plane handlers: register reads and writes.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldgate_core::types::{DeviceId, RegisterType};
use fieldgate_modbus::GatewayStatus;

use crate::error::ApiResult;
use crate::pipeline::{self, ReadSource};
use crate::state::AppState;

// =============================================================================
// Listing
// =============================================================================

/// One row of `GET /api/devices`.
#[derive(Debug, Serialize)]
pub struct DeviceSummary {
    /// Device id.
    pub device_id: String,
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Modbus unit id.
    pub slave_id: u8,
    /// Per-attempt timeout in seconds.
    pub timeout: u16,
    /// The gateway the device routes through, as `host:port`.
    pub gateway: String,
}

/// `GET /api/devices` — active devices currently known to the manager.
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceSummary>> {
    let devices = state
        .manager
        .devices()
        .into_iter()
        .map(|cfg| DeviceSummary {
            device_id: cfg.device_id.to_string(),
            host: cfg.host.clone(),
            port: cfg.port,
            slave_id: cfg.slave_id,
            timeout: cfg.timeout_seconds,
            gateway: cfg.gateway_key().to_string(),
        })
        .collect();
    Json(devices)
}

/// `GET /api/devices/gateways` — gateway connection and breaker status.
pub async fn list_gateways(State(state): State<AppState>) -> Json<Vec<GatewayStatus>> {
    Json(state.manager.gateways_status())
}

// =============================================================================
// Read
// =============================================================================

/// Query parameters of `GET /api/devices/{device_id}/registers`.
#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    /// Start address.
    pub address: i64,
    /// Number of items, 1-125.
    #[serde(default = "default_count")]
    pub count: i64,
    /// Register space.
    #[serde(default)]
    pub register_type: RegisterType,
    /// Data source.
    #[serde(default)]
    pub source: ReadSource,
}

fn default_count() -> i64 {
    1
}

/// Response body of the register read.
#[derive(Debug, Serialize)]
pub struct ReadResponse {
    /// Device id.
    pub device_id: String,
    /// Register space.
    pub register_type: RegisterType,
    /// Start address.
    pub address: i64,
    /// Number of items.
    pub count: i64,
    /// The values, bit spaces as 0/1.
    pub values: Vec<u16>,
    /// Where the values came from.
    pub source: ReadSource,
    /// Cache timestamp, present for cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

/// `GET /api/devices/{device_id}/registers`
pub async fn read_registers(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> ApiResult<Json<ReadResponse>> {
    let device_id = DeviceId::new(device_id);
    let outcome = pipeline::read(
        &state,
        &device_id,
        query.register_type,
        query.address,
        query.count,
        query.source,
    )
    .await?;

    Ok(Json(ReadResponse {
        device_id: device_id.to_string(),
        register_type: query.register_type,
        address: query.address,
        count: query.count,
        values: outcome.values,
        source: outcome.source,
        cached_at: outcome.cached_at,
    }))
}

// =============================================================================
// Write
// =============================================================================

/// Body of `POST /api/devices/{device_id}/registers/write`.
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    /// Item address.
    pub address: i64,
    /// Value to write (0/1 for coils).
    pub value: i64,
    /// Register space; only `holding` and `coil` are writable.
    #[serde(default)]
    pub register_type: RegisterType,
}

/// Response body of the write.
#[derive(Debug, Serialize)]
pub struct WriteResponse {
    /// Device id.
    pub device_id: String,
    /// Always `"ok"`.
    pub status: &'static str,
    /// Item address.
    pub address: i64,
    /// Written value.
    pub value: i64,
    /// Register space.
    pub register_type: RegisterType,
}

/// `POST /api/devices/{device_id}/registers/write`
pub async fn write_register(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(body): Json<WriteRequest>,
) -> ApiResult<Json<WriteResponse>> {
    let device_id = DeviceId::new(device_id);
    pipeline::write(
        &state,
        &device_id,
        body.register_type,
        body.address,
        body.value,
    )
    .await?;

    Ok(Json(WriteResponse {
        device_id: device_id.to_string(),
        status: "ok",
        address: body.address,
        value: body.value,
        register_type: body.register_type,
    }))
}
