// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Admin handlers for cache inspection.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use fieldgate_core::cache::CacheEntry;
use fieldgate_core::types::{DeviceId, RegisterType};

use crate::state::AppState;

/// One cached entry as exposed on the admin API.
#[derive(Debug, Serialize)]
pub struct CacheEntryView {
    /// Composite cache key.
    pub key: String,
    /// Device id.
    pub device_id: String,
    /// Register space.
    pub register_type: RegisterType,
    /// Start address.
    pub address: u16,
    /// Number of items.
    pub count: u16,
    /// The values.
    pub values: Vec<u16>,
    /// When the values were read.
    pub cached_at: DateTime<Utc>,
    /// Entry age in seconds.
    pub age_seconds: f64,
}

impl From<CacheEntry> for CacheEntryView {
    fn from(entry: CacheEntry) -> Self {
        let age_seconds = entry.age().as_secs_f64();
        Self {
            key: entry.key(),
            device_id: entry.device_id.to_string(),
            register_type: entry.register_type,
            address: entry.address,
            count: entry.count,
            values: entry.values,
            cached_at: entry.cached_at,
            age_seconds,
        }
    }
}

/// `GET /api/admin/cache` — every live entry.
pub async fn inspect_cache(State(state): State<AppState>) -> Json<Vec<CacheEntryView>> {
    let mut entries: Vec<CacheEntryView> = state
        .cache
        .entries()
        .into_iter()
        .map(CacheEntryView::from)
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Json(entries)
}

/// `GET /api/admin/cache/device/{device_id}` — live entries of one device.
pub async fn inspect_device_cache(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Json<Vec<CacheEntryView>> {
    let device_id = DeviceId::new(device_id);
    let mut entries: Vec<CacheEntryView> = state
        .cache
        .device_entries(&device_id)
        .into_iter()
        .map(CacheEntryView::from)
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Json(entries)
}

/// Cache statistics body.
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    /// Number of stored entries.
    pub total_entries: usize,
    /// Devices with at least one live entry.
    pub devices: Vec<String>,
    /// Oldest live entry timestamp.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Newest live entry timestamp.
    pub newest_entry: Option<DateTime<Utc>>,
    /// Lookup hits.
    pub hits: u64,
    /// Lookup misses.
    pub misses: u64,
    /// Upserts.
    pub sets: u64,
    /// Expired entries dropped.
    pub evictions: u64,
    /// Hit percentage.
    pub hit_rate_percent: f64,
}

/// `GET /api/admin/cache/stats`
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    let entries = state.cache.entries();
    let stats = state.cache.stats();

    let mut devices: Vec<String> = entries
        .iter()
        .map(|entry| entry.device_id.to_string())
        .collect();
    devices.sort();
    devices.dedup();

    Json(CacheStatsResponse {
        total_entries: stats.entries,
        devices,
        oldest_entry: entries.iter().map(|e| e.cached_at).min(),
        newest_entry: entries.iter().map(|e| e.cached_at).max(),
        hits: stats.hits,
        misses: stats.misses,
        sets: stats.sets,
        evictions: stats.evictions,
        hit_rate_percent: stats.hit_rate_percent,
    })
}

/// Response of the cache clear endpoint.
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Number of entries removed.
    pub cleared: usize,
}

/// `DELETE /api/admin/cache` — drop everything.
pub async fn clear_cache(State(state): State<AppState>) -> Json<ClearCacheResponse> {
    let cleared = state.cache.clear();
    tracing::info!(cleared, "cache cleared via admin API");
    Json(ClearCacheResponse {
        status: "ok",
        cleared,
    })
}
