// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Store traits.
//!
//! The runtime only ever sees these traits; whether rows live in Postgres
//! or in memory is an assembly decision.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{
    DeviceCreate, DeviceRecord, DeviceUpdate, PollingTargetCreate, PollingTargetRecord,
    PollingTargetUpdate,
};

/// Device configuration rows.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// All devices, including soft-deleted ones, ordered by id.
    async fn list_devices(&self) -> StoreResult<Vec<DeviceRecord>>;

    /// Active devices only, ordered by id.
    async fn list_active_devices(&self) -> StoreResult<Vec<DeviceRecord>>;

    /// One device by id.
    async fn get_device(&self, device_id: &str) -> StoreResult<Option<DeviceRecord>>;

    /// Inserts a device row (active). The caller has validated the payload.
    async fn create_device(&self, create: DeviceCreate, framer: String) -> StoreResult<DeviceRecord>;

    /// Applies a partial update; `None` when the row does not exist.
    async fn update_device(
        &self,
        device_id: &str,
        update: DeviceUpdate,
        framer: Option<String>,
    ) -> StoreResult<Option<DeviceRecord>>;

    /// Soft-deletes a device. Returns `false` when the row does not exist.
    async fn deactivate_device(&self, device_id: &str) -> StoreResult<bool>;

    /// Reactivates a device. Returns `false` when the row does not exist.
    async fn activate_device(&self, device_id: &str) -> StoreResult<bool>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> StoreResult<()>;
}

/// Polling-target rows.
#[async_trait]
pub trait PollingStore: Send + Sync {
    /// All targets, including soft-deleted ones, ordered by id.
    async fn list_targets(&self) -> StoreResult<Vec<PollingTargetRecord>>;

    /// Active targets only, ordered by id (the poller's per-cycle load).
    async fn list_active_targets(&self) -> StoreResult<Vec<PollingTargetRecord>>;

    /// Active targets of one device, ordered by id.
    async fn list_targets_for_device(&self, device_id: &str)
        -> StoreResult<Vec<PollingTargetRecord>>;

    /// One target by id.
    async fn get_target(&self, id: i64) -> StoreResult<Option<PollingTargetRecord>>;

    /// Inserts a target row (active). The caller has validated the payload
    /// and checked that the device exists.
    async fn create_target(
        &self,
        create: PollingTargetCreate,
        register_type: String,
    ) -> StoreResult<PollingTargetRecord>;

    /// Applies a partial update; `None` when the row does not exist.
    async fn update_target(
        &self,
        id: i64,
        update: PollingTargetUpdate,
        register_type: Option<String>,
    ) -> StoreResult<Option<PollingTargetRecord>>;

    /// Soft-deletes a target. Returns `false` when the row does not exist.
    async fn deactivate_target(&self, id: i64) -> StoreResult<bool>;

    /// Reactivates a target. Returns `false` when the row does not exist.
    async fn activate_target(&self, id: i64) -> StoreResult<bool>;
}
