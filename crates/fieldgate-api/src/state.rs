// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.
//!
//! Every runtime singleton is constructed at startup and injected here —
//! there is no global state. Handlers receive the state via axum's `State`
//! extractor.

use std::sync::Arc;

use fieldgate_core::cache::RegisterCache;
use fieldgate_core::metrics::MetricsCollector;
use fieldgate_modbus::ModbusManager;
use fieldgate_mqtt::MqttPublisher;
use fieldgate_store::{DeviceStore, PollingStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The Modbus client manager.
    pub manager: Arc<ModbusManager>,
    /// The register cache.
    pub cache: Arc<RegisterCache>,
    /// The metrics collector.
    pub metrics: Arc<MetricsCollector>,
    /// Device configuration rows.
    pub device_store: Arc<dyn DeviceStore>,
    /// Polling target rows.
    pub polling_store: Arc<dyn PollingStore>,
    /// The MQTT publisher (possibly disabled).
    pub publisher: Arc<MqttPublisher>,
}

impl AppState {
    /// Assembles the state from its components.
    pub fn new(
        manager: Arc<ModbusManager>,
        cache: Arc<RegisterCache>,
        metrics: Arc<MetricsCollector>,
        device_store: Arc<dyn DeviceStore>,
        polling_store: Arc<dyn PollingStore>,
        publisher: Arc<MqttPublisher>,
    ) -> Self {
        Self {
            manager,
            cache,
            metrics,
            device_store,
            polling_store,
            publisher,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
