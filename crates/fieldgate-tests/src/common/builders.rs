// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fixture builders shared by the integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use fieldgate_api::AppState;
use fieldgate_core::cache::RegisterCache;
use fieldgate_core::circuit_breaker::CircuitBreakerConfig;
use fieldgate_core::metrics::MetricsCollector;
use fieldgate_core::types::{DeviceConfig, DeviceId, Framer};
use fieldgate_modbus::ModbusManager;
use fieldgate_mqtt::MqttPublisher;
use fieldgate_store::{DeviceRecord, MemoryStore, PollingTargetRecord};

use super::mocks::MockNetwork;

/// A device config on `host:5020`, slave `slave_id`, no retries.
pub fn device_config(device_id: &str, host: &str, slave_id: u8) -> DeviceConfig {
    DeviceConfig {
        device_id: DeviceId::new(device_id),
        host: host.to_string(),
        port: 5020,
        slave_id,
        timeout_seconds: 5,
        framer: Framer::Socket,
        max_retries: 0,
        retry_delay_seconds: 0.0,
        is_active: true,
    }
}

/// A device row matching [`device_config`].
pub fn device_record(device_id: &str, host: &str, slave_id: u8) -> DeviceRecord {
    DeviceRecord {
        device_id: device_id.to_string(),
        host: host.to_string(),
        port: 5020,
        slave_id: i32::from(slave_id),
        timeout: 5,
        framer: "SOCKET".to_string(),
        max_retries: 0,
        retry_delay: 0.0,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A holding-register polling target row (id assigned by the store).
pub fn target_record(device_id: &str, address: i32, count: i32) -> PollingTargetRecord {
    PollingTargetRecord {
        id: 0,
        device_id: device_id.to_string(),
        register_type: "holding".to_string(),
        address,
        count,
        is_active: true,
        description: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Everything a test needs: the network, the runtime singletons and a
/// memory store, assembled exactly like the production runtime.
pub struct Harness {
    /// The scripted field network.
    pub network: Arc<MockNetwork>,
    /// The manager under test.
    pub manager: Arc<ModbusManager>,
    /// The register cache.
    pub cache: Arc<RegisterCache>,
    /// The metrics collector.
    pub metrics: Arc<MetricsCollector>,
    /// The in-memory store.
    pub store: Arc<MemoryStore>,
    /// A disabled publisher.
    pub publisher: Arc<MqttPublisher>,
}

impl Harness {
    /// Builds a harness with the given devices and breaker config.
    pub fn new(configs: Vec<DeviceConfig>, breaker: CircuitBreakerConfig) -> Self {
        let network = MockNetwork::new();
        let metrics = Arc::new(MetricsCollector::new());
        let manager = Arc::new(ModbusManager::new(
            configs,
            network.factory(),
            breaker,
            metrics.clone(),
        ));
        let cache = Arc::new(RegisterCache::new(Duration::from_secs(300)));
        let publisher = Arc::new(MqttPublisher::disabled(metrics.clone()));

        Self {
            network,
            manager,
            cache,
            metrics,
            store: Arc::new(MemoryStore::new()),
            publisher,
        }
    }

    /// Builds a harness with default breaker thresholds.
    pub fn with_devices(configs: Vec<DeviceConfig>) -> Self {
        Self::new(configs, CircuitBreakerConfig::default())
    }

    /// Assembles the HTTP application state over the harness.
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.manager.clone(),
            self.cache.clone(),
            self.metrics.clone(),
            self.store.clone(),
            self.store.clone(),
            self.publisher.clone(),
        )
    }
}
