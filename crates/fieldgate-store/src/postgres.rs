// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Postgres store implementation.
//!
//! Runtime `sqlx::query` with explicit binds and `try_get`; partial updates
//! use `coalesce` so absent fields keep their stored values. The schema is
//! bootstrapped on startup with `CREATE TABLE IF NOT EXISTS`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    DeviceCreate, DeviceRecord, DeviceUpdate, PollingTargetCreate, PollingTargetRecord,
    PollingTargetUpdate,
};
use crate::traits::{DeviceStore, PollingStore};

const DEVICE_COLUMNS: &str = "device_id, host, port, slave_id, timeout, framer, max_retries, \
                              retry_delay, is_active, created_at, updated_at";

const TARGET_COLUMNS: &str = "id, device_id, register_type, address, \"count\", is_active, \
                              description, created_at, updated_at";

// =============================================================================
// PgStore
// =============================================================================

/// Postgres-backed device and polling-target store.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool (max 8 connections) and wraps it.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the tables and index when missing.
    pub async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS modbus_devices (
                device_id   VARCHAR(50) PRIMARY KEY,
                host        VARCHAR(100) NOT NULL,
                port        INTEGER NOT NULL,
                slave_id    INTEGER NOT NULL,
                timeout     INTEGER NOT NULL DEFAULT 10,
                framer      VARCHAR(20) NOT NULL DEFAULT 'RTU',
                max_retries INTEGER NOT NULL DEFAULT 5,
                retry_delay DOUBLE PRECISION NOT NULL DEFAULT 0.1,
                is_active   BOOLEAN NOT NULL DEFAULT TRUE,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS polling_targets (
                id            BIGSERIAL PRIMARY KEY,
                device_id     VARCHAR(50) NOT NULL,
                register_type VARCHAR(20) NOT NULL,
                address       INTEGER NOT NULL,
                \"count\"     INTEGER NOT NULL,
                is_active     BOOLEAN NOT NULL DEFAULT TRUE,
                description   VARCHAR(200),
                created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_polling_targets_device_id \
             ON polling_targets (device_id)",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("database schema ready");
        Ok(())
    }
}

fn map_device_row(row: &PgRow) -> Result<DeviceRecord, sqlx::Error> {
    Ok(DeviceRecord {
        device_id: row.try_get("device_id")?,
        host: row.try_get("host")?,
        port: row.try_get("port")?,
        slave_id: row.try_get("slave_id")?,
        timeout: row.try_get("timeout")?,
        framer: row.try_get("framer")?,
        max_retries: row.try_get("max_retries")?,
        retry_delay: row.try_get("retry_delay")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_target_row(row: &PgRow) -> Result<PollingTargetRecord, sqlx::Error> {
    Ok(PollingTargetRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        register_type: row.try_get("register_type")?,
        address: row.try_get("address")?,
        count: row.try_get("count")?,
        is_active: row.try_get("is_active")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl DeviceStore for PgStore {
    async fn list_devices(&self) -> StoreResult<Vec<DeviceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM modbus_devices ORDER BY device_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| map_device_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_active_devices(&self) -> StoreResult<Vec<DeviceRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM modbus_devices WHERE is_active ORDER BY device_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| map_device_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn get_device(&self, device_id: &str) -> StoreResult<Option<DeviceRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DEVICE_COLUMNS} FROM modbus_devices WHERE device_id = $1"
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_device_row).transpose().map_err(StoreError::from)
    }

    async fn create_device(&self, create: DeviceCreate, framer: String) -> StoreResult<DeviceRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO modbus_devices \
             (device_id, host, port, slave_id, timeout, framer, max_retries, retry_delay) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(&create.device_id)
        .bind(&create.host)
        .bind(create.port)
        .bind(create.slave_id)
        .bind(create.timeout)
        .bind(&framer)
        .bind(create.max_retries)
        .bind(create.retry_delay)
        .fetch_one(&self.pool)
        .await?;

        map_device_row(&row).map_err(StoreError::from)
    }

    async fn update_device(
        &self,
        device_id: &str,
        update: DeviceUpdate,
        framer: Option<String>,
    ) -> StoreResult<Option<DeviceRecord>> {
        let row = sqlx::query(&format!(
            "UPDATE modbus_devices SET \
             host        = coalesce($1, host), \
             port        = coalesce($2, port), \
             slave_id    = coalesce($3, slave_id), \
             timeout     = coalesce($4, timeout), \
             framer      = coalesce($5, framer), \
             max_retries = coalesce($6, max_retries), \
             retry_delay = coalesce($7, retry_delay), \
             updated_at  = $8 \
             WHERE device_id = $9 \
             RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(update.host)
        .bind(update.port)
        .bind(update.slave_id)
        .bind(update.timeout)
        .bind(framer)
        .bind(update.max_retries)
        .bind(update.retry_delay)
        .bind(Utc::now())
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_device_row).transpose().map_err(StoreError::from)
    }

    async fn deactivate_device(&self, device_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE modbus_devices SET is_active = FALSE, updated_at = $1 WHERE device_id = $2",
        )
        .bind(Utc::now())
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn activate_device(&self, device_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE modbus_devices SET is_active = TRUE, updated_at = $1 WHERE device_id = $2",
        )
        .bind(Utc::now())
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PollingStore for PgStore {
    async fn list_targets(&self) -> StoreResult<Vec<PollingTargetRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM polling_targets ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| map_target_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_active_targets(&self) -> StoreResult<Vec<PollingTargetRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM polling_targets WHERE is_active ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| map_target_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn list_targets_for_device(
        &self,
        device_id: &str,
    ) -> StoreResult<Vec<PollingTargetRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM polling_targets \
             WHERE device_id = $1 AND is_active ORDER BY id"
        ))
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| map_target_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn get_target(&self, id: i64) -> StoreResult<Option<PollingTargetRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TARGET_COLUMNS} FROM polling_targets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_target_row).transpose().map_err(StoreError::from)
    }

    async fn create_target(
        &self,
        create: PollingTargetCreate,
        register_type: String,
    ) -> StoreResult<PollingTargetRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO polling_targets (device_id, register_type, address, \"count\", description) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {TARGET_COLUMNS}"
        ))
        .bind(&create.device_id)
        .bind(&register_type)
        .bind(create.address)
        .bind(create.count)
        .bind(&create.description)
        .fetch_one(&self.pool)
        .await?;

        map_target_row(&row).map_err(StoreError::from)
    }

    async fn update_target(
        &self,
        id: i64,
        update: PollingTargetUpdate,
        register_type: Option<String>,
    ) -> StoreResult<Option<PollingTargetRecord>> {
        let row = sqlx::query(&format!(
            "UPDATE polling_targets SET \
             register_type = coalesce($1, register_type), \
             address       = coalesce($2, address), \
             \"count\"     = coalesce($3, \"count\"), \
             description   = coalesce($4, description), \
             updated_at    = $5 \
             WHERE id = $6 \
             RETURNING {TARGET_COLUMNS}"
        ))
        .bind(register_type)
        .bind(update.address)
        .bind(update.count)
        .bind(update.description)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_target_row).transpose().map_err(StoreError::from)
    }

    async fn deactivate_target(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE polling_targets SET is_active = FALSE, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn activate_target(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE polling_targets SET is_active = TRUE, updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore").finish_non_exhaustive()
    }
}
