// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The request pipeline.
//!
//! Validation, live-vs-cache source selection and the write path sit here,
//! between the HTTP handlers and the Modbus manager. Every live operation
//! runs under a 5 second wall-clock budget; when the budget expires the
//! in-flight attempt is abandoned and the gateway connection is reset so
//! the next caller starts clean.

use std::time::Duration;

use chrono::{DateTime, Utc};

use fieldgate_core::error::{CoreError, CoreResult};
use fieldgate_core::types::{validate_read_range, DeviceId, RegisterType};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Total wall-clock budget per API request.
pub const REQUEST_BUDGET: Duration = Duration::from_secs(5);

// =============================================================================
// Read
// =============================================================================

/// Requested data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadSource {
    /// Read from the device.
    #[default]
    Live,
    /// Prefer the cache; fall back to live on a miss.
    Cache,
}

/// Result of a pipeline read.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    /// The values, bit spaces as 0/1.
    pub values: Vec<u16>,
    /// Where the values actually came from.
    pub source: ReadSource,
    /// Timestamp of the cache entry when `source` is `Cache`.
    pub cached_at: Option<DateTime<Utc>>,
}

/// Validates and executes a read.
///
/// `source = cache` consults the cache first and never touches the device
/// on a hit; a miss falls back to a live read (the outcome then reports
/// `Live`). Live reads refresh the cache.
pub async fn read(
    state: &AppState,
    device_id: &DeviceId,
    register_type: RegisterType,
    address: i64,
    count: i64,
    source: ReadSource,
) -> CoreResult<ReadOutcome> {
    let (address, count) = validate_range(address, count)?;

    if source == ReadSource::Cache {
        if let Some(entry) = state.cache.get(device_id, register_type, address, count) {
            return Ok(ReadOutcome {
                values: entry.values,
                source: ReadSource::Cache,
                cached_at: Some(entry.cached_at),
            });
        }
    }

    let values = with_budget(
        state,
        device_id,
        state.manager.read(device_id, register_type, address, count),
    )
    .await?;

    state.cache.set(
        device_id.clone(),
        register_type,
        address,
        count,
        values.clone(),
    );

    Ok(ReadOutcome {
        values,
        source: ReadSource::Live,
        cached_at: None,
    })
}

// =============================================================================
// Write
// =============================================================================

/// Validates and executes a write, then invalidates every cached range the
/// written item overlaps. Writes are always live.
pub async fn write(
    state: &AppState,
    device_id: &DeviceId,
    register_type: RegisterType,
    address: i64,
    value: i64,
) -> CoreResult<()> {
    let (address, _) = validate_range(address, 1)?;
    let value = validate_write_value(register_type, value)?;

    with_budget(
        state,
        device_id,
        state.manager.write(device_id, register_type, address, value),
    )
    .await?;

    let invalidated = state
        .cache
        .invalidate_overlapping(device_id, register_type, address, 1);
    if invalidated > 0 {
        tracing::debug!(
            device_id = %device_id,
            register_type = %register_type,
            address,
            invalidated,
            "invalidated cached ranges after write"
        );
    }

    Ok(())
}

// =============================================================================
// Validation helpers
// =============================================================================

fn validate_range(address: i64, count: i64) -> CoreResult<(u16, u16)> {
    let address = u16::try_from(address)
        .map_err(|_| CoreError::validation("address", "must be 0-65535"))?;
    let count = u16::try_from(count).map_err(|_| {
        CoreError::validation("count", format!("must be 1-{}", RegisterType::MAX_READ_COUNT))
    })?;
    validate_read_range(address, count)?;
    Ok((address, count))
}

fn validate_write_value(register_type: RegisterType, value: i64) -> CoreResult<u16> {
    if !register_type.is_writable() {
        return Err(CoreError::validation(
            "register_type",
            "only holding and coil registers are writable",
        ));
    }
    if register_type.is_bit() {
        if !(0..=1).contains(&value) {
            return Err(CoreError::validation("value", "coil values must be 0 or 1"));
        }
    } else if !(0..=0xFFFF).contains(&value) {
        return Err(CoreError::validation("value", "must be 0-65535"));
    }
    Ok(value as u16)
}

/// Bounds a manager call by [`REQUEST_BUDGET`]; on expiry the gateway is
/// reset and a timeout transport error is surfaced.
async fn with_budget<T, F>(state: &AppState, device_id: &DeviceId, operation: F) -> CoreResult<T>
where
    F: std::future::Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(REQUEST_BUDGET, operation).await {
        Ok(result) => result,
        Err(_) => {
            // Abandoning the attempt leaves the connection in an unknown
            // framing state; reset so the next caller reopens it.
            if let Err(error) = state.manager.reset_gateway(device_id).await {
                tracing::debug!(device_id = %device_id, error = %error, "gateway reset after budget expiry failed");
            }
            Err(CoreError::timeout(format!(
                "request exceeded the {}s budget, gateway connection reset",
                REQUEST_BUDGET.as_secs()
            )))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_validation_bounds() {
        assert!(validate_range(0, 0).is_err());
        assert!(validate_range(0, 1).is_ok());
        assert!(validate_range(0, 125).is_ok());
        assert!(validate_range(0, 126).is_err());
        assert!(validate_range(-1, 1).is_err());
        assert!(validate_range(65536, 1).is_err());
        assert!(validate_range(65535, 1).is_ok());
        assert!(validate_range(65535, 2).is_err());
    }

    #[test]
    fn write_value_validation() {
        assert_eq!(validate_write_value(RegisterType::Holding, 0).unwrap(), 0);
        assert_eq!(
            validate_write_value(RegisterType::Holding, 65535).unwrap(),
            65535
        );
        assert!(validate_write_value(RegisterType::Holding, 65536).is_err());
        assert!(validate_write_value(RegisterType::Holding, -1).is_err());

        assert_eq!(validate_write_value(RegisterType::Coil, 1).unwrap(), 1);
        assert!(validate_write_value(RegisterType::Coil, 2).is_err());

        assert!(validate_write_value(RegisterType::Input, 1).is_err());
        assert!(validate_write_value(RegisterType::Discrete, 1).is_err());
    }

    #[test]
    fn read_source_serde() {
        assert_eq!(
            serde_json::from_str::<ReadSource>("\"cache\"").unwrap(),
            ReadSource::Cache
        );
        assert_eq!(serde_json::to_string(&ReadSource::Live).unwrap(), "\"live\"");
        assert_eq!(ReadSource::default(), ReadSource::Live);
    }
}
