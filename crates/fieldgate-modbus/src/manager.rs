// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The Modbus client manager.
//!
//! The manager owns the device map and the gateway registry, and is the
//! single entry point for every Modbus operation:
//!
//! 1. Resolve the device, else `NotFound`.
//! 2. Fetch (or lazily create) the gateway for the device's `(host, port)`.
//! 3. Check the gateway's circuit breaker — open means fail fast, no I/O.
//! 4. Take the gateway's transport lock for the whole call, retries
//!    included, so frames for one bus never interleave.
//! 5. Run the retry ladder: a Modbus exception surfaces immediately as a
//!    device error; transport failures reset the connection and retry up to
//!    the device's `max_retries` with `retry_delay` pauses.
//!
//! The device map is copy-on-write: readers grab an `Arc` snapshot,
//! [`ModbusManager::reload`] swaps in a new map and closes gateways no
//! active device references anymore.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::time::timeout;

use fieldgate_core::circuit_breaker::CircuitBreakerConfig;
use fieldgate_core::error::{CoreError, CoreResult, TransportKind};
use fieldgate_core::metrics::MetricsCollector;
use fieldgate_core::types::{DeviceConfig, DeviceId, GatewayKey, RegisterType};

use crate::error::{exception_name, ClientError, ClientResult};
use crate::gateway::{Gateway, GatewayStatus};
use crate::transport::{ModbusTransport, Operation, TransportFactory};

// =============================================================================
// ModbusManager
// =============================================================================

/// Registry of device configs and multiplexed gateway connections.
pub struct ModbusManager {
    devices: RwLock<Arc<HashMap<String, DeviceConfig>>>,
    gateways: DashMap<GatewayKey, Arc<Gateway>>,
    factory: Arc<dyn TransportFactory>,
    breaker_config: CircuitBreakerConfig,
    metrics: Arc<MetricsCollector>,
}

impl ModbusManager {
    /// Creates a manager over the given device configs.
    ///
    /// Gateways are not opened here; they connect lazily on first use.
    pub fn new(
        configs: Vec<DeviceConfig>,
        factory: Arc<dyn TransportFactory>,
        breaker_config: CircuitBreakerConfig,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let map: HashMap<String, DeviceConfig> = configs
            .into_iter()
            .map(|cfg| (cfg.device_id.to_string(), cfg))
            .collect();

        Self {
            devices: RwLock::new(Arc::new(map)),
            gateways: DashMap::new(),
            factory,
            breaker_config,
            metrics,
        }
    }

    // =========================================================================
    // Device map
    // =========================================================================

    /// Immutable snapshot of the device map.
    pub fn device_snapshot(&self) -> Arc<HashMap<String, DeviceConfig>> {
        self.devices.read().clone()
    }

    /// Resolves one device config.
    pub fn device(&self, device_id: &DeviceId) -> CoreResult<DeviceConfig> {
        self.device_snapshot()
            .get(device_id.as_str())
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("device '{device_id}'")))
    }

    /// All managed device configs, sorted by id.
    pub fn devices(&self) -> Vec<DeviceConfig> {
        let snapshot = self.device_snapshot();
        let mut configs: Vec<DeviceConfig> = snapshot.values().cloned().collect();
        configs.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        configs
    }

    /// Number of managed devices.
    pub fn device_count(&self) -> usize {
        self.device_snapshot().len()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Reads `count` items from a register space of a device.
    ///
    /// Bit spaces come back as 0/1.
    pub async fn read(
        &self,
        device_id: &DeviceId,
        register_type: RegisterType,
        address: u16,
        count: u16,
    ) -> CoreResult<Vec<u16>> {
        self.call(
            device_id,
            Operation::Read {
                register_type,
                address,
                count,
            },
        )
        .await
    }

    /// Writes one item to a writable register space of a device.
    pub async fn write(
        &self,
        device_id: &DeviceId,
        register_type: RegisterType,
        address: u16,
        value: u16,
    ) -> CoreResult<()> {
        self.call(
            device_id,
            Operation::Write {
                register_type,
                address,
                value,
            },
        )
        .await
        .map(|_| ())
    }

    async fn call(&self, device_id: &DeviceId, operation: Operation) -> CoreResult<Vec<u16>> {
        let device = self.device(device_id)?;
        let gateway = self.gateway_for(&device);

        gateway.breaker().try_acquire().map_err(|remaining| {
            CoreError::circuit_open(gateway.key().to_string(), remaining)
        })?;

        let started = Instant::now();
        let result = self.execute_with_retries(&gateway, &device, operation).await;
        let latency = started.elapsed();

        match &result {
            Ok(_) => {
                gateway.breaker().record_success();
                self.metrics
                    .record_modbus_request(operation.register_type(), true, latency);
            }
            Err(CoreError::Device { .. }) => {
                // The transport delivered a well-formed answer; only the
                // device objected. The gateway link is healthy.
                gateway.breaker().record_success();
                self.metrics
                    .record_modbus_request(operation.register_type(), false, latency);
            }
            Err(_) => {
                gateway.breaker().record_failure();
                self.metrics
                    .record_modbus_request(operation.register_type(), false, latency);
            }
        }

        result
    }

    async fn execute_with_retries(
        &self,
        gateway: &Gateway,
        device: &DeviceConfig,
        operation: Operation,
    ) -> CoreResult<Vec<u16>> {
        let mut transport = gateway.lock_transport().await;
        let mut attempt: u32 = 0;

        loop {
            match Self::attempt(gateway, &mut **transport, device, operation).await {
                Ok(values) => return Ok(values),

                Err(ClientError::Exception { function, code }) => {
                    return Err(CoreError::device(
                        code,
                        format!(
                            "device '{}' rejected function 0x{function:02X}: {}",
                            device.device_id,
                            exception_name(code)
                        ),
                    ));
                }

                Err(error) => {
                    // Transport trouble: drop the connection so the next
                    // attempt (or the next caller) reopens it.
                    transport.disconnect().await;
                    gateway.mark_connected(false);

                    if attempt >= u32::from(device.max_retries) {
                        return Err(map_transport_error(error, device));
                    }

                    attempt += 1;
                    tracing::debug!(
                        device_id = %device.device_id,
                        gateway = %gateway.key(),
                        attempt,
                        max_retries = device.max_retries,
                        error = %error,
                        "retrying modbus operation"
                    );
                    tokio::time::sleep(device.retry_delay()).await;
                }
            }
        }
    }

    /// One bounded attempt: (re)connect if needed, then execute.
    async fn attempt(
        gateway: &Gateway,
        transport: &mut dyn ModbusTransport,
        device: &DeviceConfig,
        operation: Operation,
    ) -> ClientResult<Vec<u16>> {
        if !transport.is_connected() {
            match timeout(device.timeout(), transport.connect()).await {
                Ok(Ok(())) => gateway.mark_connected(true),
                Ok(Err(error)) => return Err(error),
                Err(_) => return Err(ClientError::timeout(device.timeout())),
            }
        }

        match timeout(device.timeout(), transport.execute(device.slave_id, operation)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::timeout(device.timeout())),
        }
    }

    // =========================================================================
    // Gateways
    // =========================================================================

    fn gateway_for(&self, device: &DeviceConfig) -> Arc<Gateway> {
        let key = device.gateway_key();
        self.gateways
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::info!(gateway = %key, framer = %device.framer, "creating gateway");
                Arc::new(Gateway::new(
                    key.clone(),
                    self.factory.create(&key, device.framer, device.timeout()),
                    self.breaker_config.clone(),
                ))
            })
            .clone()
    }

    /// Status of every live gateway, sorted by `host:port`.
    pub fn gateways_status(&self) -> Vec<GatewayStatus> {
        let mut statuses: Vec<GatewayStatus> = self
            .gateways
            .iter()
            .map(|entry| entry.value().status())
            .collect();
        statuses.sort_by(|a, b| (&a.host, a.port).cmp(&(&b.host, b.port)));
        statuses
    }

    /// Resets the gateway a device routes through (next call reconnects).
    ///
    /// Invoked by the request pipeline when the wall-clock budget expires
    /// while an attempt is still in flight.
    pub async fn reset_gateway(&self, device_id: &DeviceId) -> CoreResult<()> {
        let device = self.device(device_id)?;
        // Clone the Arc out of the map guard before awaiting.
        let gateway = self
            .gateways
            .get(&device.gateway_key())
            .map(|entry| entry.value().clone());
        if let Some(gateway) = gateway {
            gateway.reset().await;
        }
        Ok(())
    }

    /// Atomically swaps the device map and drops unreferenced gateways.
    pub async fn reload(&self, configs: Vec<DeviceConfig>) {
        let new_map: HashMap<String, DeviceConfig> = configs
            .into_iter()
            .map(|cfg| (cfg.device_id.to_string(), cfg))
            .collect();

        let retained: HashSet<GatewayKey> = new_map.values().map(DeviceConfig::gateway_key).collect();
        let device_count = new_map.len();

        *self.devices.write() = Arc::new(new_map);

        let stale: Vec<GatewayKey> = self
            .gateways
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| !retained.contains(key))
            .collect();

        for key in stale {
            if let Some((_, gateway)) = self.gateways.remove(&key) {
                gateway.close().await;
                tracing::info!(gateway = %key, "dropped gateway with no remaining devices");
            }
        }

        tracing::info!(devices = device_count, gateways = self.gateways.len(), "device map reloaded");
    }

    /// Closes every gateway. Part of process shutdown.
    pub async fn close_all(&self) {
        let gateways: Vec<Arc<Gateway>> = self
            .gateways
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for gateway in gateways {
            gateway.close().await;
        }
        self.gateways.clear();
        tracing::info!("all gateways closed");
    }
}

impl std::fmt::Debug for ModbusManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusManager")
            .field("devices", &self.device_count())
            .field("gateways", &self.gateways.len())
            .finish()
    }
}

fn map_transport_error(error: ClientError, device: &DeviceConfig) -> CoreError {
    let context = format!("device '{}': {error}", device.device_id);
    match error {
        ClientError::Timeout { .. } => CoreError::transport(TransportKind::Timeout, context),
        ClientError::Connect { .. } => CoreError::transport(TransportKind::Connect, context),
        ClientError::Io { .. }
        | ClientError::Frame { .. }
        | ClientError::NotConnected => CoreError::transport(TransportKind::Io, context),
        // Exceptions are classified before this point.
        ClientError::Exception { code, .. } => CoreError::device(code, context),
    }
}

// =============================================================================
// Tests
// =============================================================================
