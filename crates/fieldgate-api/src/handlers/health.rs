// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Health handler.
//!
//! 200 when every required collaborator is healthy, 503 otherwise. MQTT
//! only participates when a broker is configured.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Health of one component.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component name.
    pub name: &'static str,
    /// Whether the component is healthy.
    pub healthy: bool,
    /// Detail, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: &'static str,
    /// Per-component breakdown.
    pub components: Vec<ComponentHealth>,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut components = Vec::with_capacity(3);

    let database = match state.device_store.ping().await {
        Ok(()) => ComponentHealth {
            name: "database",
            healthy: true,
            detail: None,
        },
        Err(error) => ComponentHealth {
            name: "database",
            healthy: false,
            detail: Some(error.to_string()),
        },
    };
    components.push(database);

    let mqtt_healthy = state.publisher.is_connected();
    components.push(ComponentHealth {
        name: "mqtt",
        healthy: mqtt_healthy,
        detail: if state.publisher.is_enabled() && !mqtt_healthy {
            Some("broker session down".to_string())
        } else {
            None
        },
    });

    components.push(ComponentHealth {
        name: "modbus_manager",
        healthy: true,
        detail: None,
    });

    let all_healthy = components.iter().all(|component| component.healthy);
    let (status, body_status) = if all_healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: body_status,
            components,
        }),
    )
}
