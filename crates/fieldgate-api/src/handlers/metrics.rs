// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Metrics handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use fieldgate_core::metrics::MetricsSnapshot;

use crate::state::AppState;

/// `GET /api/metrics` — full counter snapshot.
pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot(state.cache.stats()))
}

/// Response of the metrics reset.
#[derive(Debug, Serialize)]
pub struct ResetMetricsResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Human-readable summary.
    pub message: &'static str,
}

/// `POST /api/metrics/reset` — zero every counter, including the cache's.
pub async fn reset_metrics(State(state): State<AppState>) -> Json<ResetMetricsResponse> {
    state.metrics.reset();
    state.cache.reset_counters();
    tracing::info!("metrics reset via admin API");
    Json(ResetMetricsResponse {
        status: "ok",
        message: "all metrics have been reset",
    })
}
