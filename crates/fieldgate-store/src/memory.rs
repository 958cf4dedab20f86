// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory store.
//!
//! Implements the same traits as [`PgStore`](crate::postgres::PgStore)
//! over locked maps. Used by the integration tests and handy for running
//! the service without a database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::StoreResult;
use crate::models::{
    DeviceCreate, DeviceRecord, DeviceUpdate, PollingTargetCreate, PollingTargetRecord,
    PollingTargetUpdate,
};
use crate::traits::{DeviceStore, PollingStore};

/// In-memory device and polling-target store.
#[derive(Default)]
pub struct MemoryStore {
    devices: RwLock<BTreeMap<String, DeviceRecord>>,
    targets: RwLock<BTreeMap<i64, PollingTargetRecord>>,
    next_target_id: RwLock<i64>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            targets: RwLock::new(BTreeMap::new()),
            next_target_id: RwLock::new(1),
        }
    }

    /// Seeds a device row directly (test setup).
    pub fn insert_device(&self, record: DeviceRecord) {
        self.devices.write().insert(record.device_id.clone(), record);
    }

    /// Seeds a target row directly (test setup), assigning the next id.
    pub fn insert_target(&self, mut record: PollingTargetRecord) -> i64 {
        let mut next = self.next_target_id.write();
        record.id = *next;
        *next += 1;
        let id = record.id;
        self.targets.write().insert(id, record);
        id
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn list_devices(&self) -> StoreResult<Vec<DeviceRecord>> {
        Ok(self.devices.read().values().cloned().collect())
    }

    async fn list_active_devices(&self) -> StoreResult<Vec<DeviceRecord>> {
        Ok(self
            .devices
            .read()
            .values()
            .filter(|record| record.is_active)
            .cloned()
            .collect())
    }

    async fn get_device(&self, device_id: &str) -> StoreResult<Option<DeviceRecord>> {
        Ok(self.devices.read().get(device_id).cloned())
    }

    async fn create_device(&self, create: DeviceCreate, framer: String) -> StoreResult<DeviceRecord> {
        let now = Utc::now();
        let record = DeviceRecord {
            device_id: create.device_id,
            host: create.host,
            port: create.port,
            slave_id: create.slave_id,
            timeout: create.timeout,
            framer,
            max_retries: create.max_retries,
            retry_delay: create.retry_delay,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.devices
            .write()
            .insert(record.device_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_device(
        &self,
        device_id: &str,
        update: DeviceUpdate,
        framer: Option<String>,
    ) -> StoreResult<Option<DeviceRecord>> {
        let mut devices = self.devices.write();
        let Some(record) = devices.get_mut(device_id) else {
            return Ok(None);
        };

        if let Some(host) = update.host {
            record.host = host;
        }
        if let Some(port) = update.port {
            record.port = port;
        }
        if let Some(slave_id) = update.slave_id {
            record.slave_id = slave_id;
        }
        if let Some(timeout) = update.timeout {
            record.timeout = timeout;
        }
        if let Some(framer) = framer {
            record.framer = framer;
        }
        if let Some(max_retries) = update.max_retries {
            record.max_retries = max_retries;
        }
        if let Some(retry_delay) = update.retry_delay {
            record.retry_delay = retry_delay;
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn deactivate_device(&self, device_id: &str) -> StoreResult<bool> {
        let mut devices = self.devices.write();
        match devices.get_mut(device_id) {
            Some(record) => {
                record.is_active = false;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn activate_device(&self, device_id: &str) -> StoreResult<bool> {
        let mut devices = self.devices.write();
        match devices.get_mut(device_id) {
            Some(record) => {
                record.is_active = true;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl PollingStore for MemoryStore {
    async fn list_targets(&self) -> StoreResult<Vec<PollingTargetRecord>> {
        Ok(self.targets.read().values().cloned().collect())
    }

    async fn list_active_targets(&self) -> StoreResult<Vec<PollingTargetRecord>> {
        Ok(self
            .targets
            .read()
            .values()
            .filter(|record| record.is_active)
            .cloned()
            .collect())
    }

    async fn list_targets_for_device(
        &self,
        device_id: &str,
    ) -> StoreResult<Vec<PollingTargetRecord>> {
        Ok(self
            .targets
            .read()
            .values()
            .filter(|record| record.device_id == device_id && record.is_active)
            .cloned()
            .collect())
    }

    async fn get_target(&self, id: i64) -> StoreResult<Option<PollingTargetRecord>> {
        Ok(self.targets.read().get(&id).cloned())
    }

    async fn create_target(
        &self,
        create: PollingTargetCreate,
        register_type: String,
    ) -> StoreResult<PollingTargetRecord> {
        let now = Utc::now();
        let id = {
            let mut next = self.next_target_id.write();
            let id = *next;
            *next += 1;
            id
        };
        let record = PollingTargetRecord {
            id,
            device_id: create.device_id,
            register_type,
            address: create.address,
            count: create.count,
            is_active: true,
            description: create.description,
            created_at: now,
            updated_at: now,
        };
        self.targets.write().insert(id, record.clone());
        Ok(record)
    }

    async fn update_target(
        &self,
        id: i64,
        update: PollingTargetUpdate,
        register_type: Option<String>,
    ) -> StoreResult<Option<PollingTargetRecord>> {
        let mut targets = self.targets.write();
        let Some(record) = targets.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(register_type) = register_type {
            record.register_type = register_type;
        }
        if let Some(address) = update.address {
            record.address = address;
        }
        if let Some(count) = update.count {
            record.count = count;
        }
        if let Some(description) = update.description {
            record.description = Some(description);
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn deactivate_target(&self, id: i64) -> StoreResult<bool> {
        let mut targets = self.targets.write();
        match targets.get_mut(&id) {
            Some(record) => {
                record.is_active = false;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn activate_target(&self, id: i64) -> StoreResult<bool> {
        let mut targets = self.targets.write();
        match targets.get_mut(&id) {
            Some(record) => {
                record.is_active = true;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("devices", &self.devices.read().len())
            .field("targets", &self.targets.read().len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_payload(id: &str) -> DeviceCreate {
        DeviceCreate {
            device_id: id.to_string(),
            host: "10.0.0.5".to_string(),
            port: 5020,
            slave_id: 1,
            timeout: 10,
            framer: "RTU".to_string(),
            max_retries: 5,
            retry_delay: 0.1,
        }
    }

    #[tokio::test]
    async fn device_crud_roundtrip() {
        let store = MemoryStore::new();

        let record = store
            .create_device(create_payload("d1"), "RTU".to_string())
            .await
            .unwrap();
        assert!(record.is_active);

        let fetched = store.get_device("d1").await.unwrap().unwrap();
        assert_eq!(fetched.host, "10.0.0.5");

        let updated = store
            .update_device(
                "d1",
                DeviceUpdate {
                    port: Some(502),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.port, 502);
        assert_eq!(updated.host, "10.0.0.5");
        assert!(updated.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn soft_delete_keeps_row() {
        let store = MemoryStore::new();
        store
            .create_device(create_payload("d1"), "RTU".to_string())
            .await
            .unwrap();

        assert!(store.deactivate_device("d1").await.unwrap());
        assert_eq!(store.list_active_devices().await.unwrap().len(), 0);
        assert_eq!(store.list_devices().await.unwrap().len(), 1);

        assert!(store.activate_device("d1").await.unwrap());
        assert_eq!(store.list_active_devices().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_rows_report_false_or_none() {
        let store = MemoryStore::new();
        assert!(!store.deactivate_device("ghost").await.unwrap());
        assert!(store.get_device("ghost").await.unwrap().is_none());
        assert!(store
            .update_device("ghost", DeviceUpdate::default(), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn targets_ordered_by_id_and_filtered_by_device() {
        let store = MemoryStore::new();

        for (device, address) in [("d1", 0), ("d2", 10), ("d1", 20)] {
            store
                .create_target(
                    PollingTargetCreate {
                        device_id: device.to_string(),
                        register_type: "holding".to_string(),
                        address,
                        count: 5,
                        description: None,
                    },
                    "holding".to_string(),
                )
                .await
                .unwrap();
        }

        let all = store.list_active_targets().await.unwrap();
        let ids: Vec<i64> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let d1_targets = store.list_targets_for_device("d1").await.unwrap();
        assert_eq!(d1_targets.len(), 2);

        assert!(store.deactivate_target(2).await.unwrap());
        assert_eq!(store.list_active_targets().await.unwrap().len(), 2);
        assert_eq!(store.list_targets().await.unwrap().len(), 3);
    }
}
