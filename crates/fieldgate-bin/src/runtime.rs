// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Runtime assembly.
//!
//! Startup order: database → device configs → manager/cache/metrics →
//! MQTT → poller → HTTP server. Teardown is the reverse: stop accepting
//! requests, let the poller finish its in-flight read, close every
//! gateway, disconnect MQTT.

use std::sync::Arc;

use fieldgate_api::{server, AppState};
use fieldgate_core::cache::RegisterCache;
use fieldgate_core::metrics::MetricsCollector;
use fieldgate_core::types::DeviceConfig;
use fieldgate_modbus::{ModbusManager, TcpTransportFactory};
use fieldgate_mqtt::MqttPublisher;
use fieldgate_poller::Poller;
use fieldgate_store::{DeviceStore, PgStore, PollingStore};

use crate::config::Settings;
use crate::error::BinError;
use crate::shutdown::{self, ShutdownController};

/// Runs the middleware until a termination signal arrives.
pub async fn run(settings: Settings) -> Result<(), BinError> {
    tracing::info!(version = fieldgate_core::VERSION, "starting fieldgate");

    // --- storage ---------------------------------------------------------
    let store = Arc::new(PgStore::connect(&settings.database_url).await?);
    store.init_schema().await?;

    let configs = load_device_configs(store.as_ref()).await?;
    tracing::info!(devices = configs.len(), "loaded device configurations");

    // --- runtime singletons ----------------------------------------------
    let metrics = Arc::new(MetricsCollector::new());
    let cache = Arc::new(RegisterCache::new(settings.cache_ttl));
    let manager = Arc::new(ModbusManager::new(
        configs,
        Arc::new(TcpTransportFactory),
        settings.breaker.clone(),
        metrics.clone(),
    ));

    let (publisher, mqtt_driver) = match settings.mqtt.clone() {
        Some(mqtt_settings) => {
            let (publisher, driver) = MqttPublisher::connect(mqtt_settings, metrics.clone());
            (Arc::new(publisher), Some(driver))
        }
        None => (Arc::new(MqttPublisher::disabled(metrics.clone())), None),
    };

    // --- shutdown wiring --------------------------------------------------
    let (controller, poller_rx) = ShutdownController::new();
    controller.listen_for_signals();

    // --- poller -----------------------------------------------------------
    let poller = Poller::new(
        manager.clone(),
        cache.clone(),
        store.clone() as Arc<dyn PollingStore>,
        publisher.clone(),
        metrics.clone(),
        settings.poll_interval,
        poller_rx,
    );
    let poller_handle = tokio::spawn(poller.run());

    // --- HTTP server ------------------------------------------------------
    let state = AppState::new(
        manager.clone(),
        cache,
        metrics,
        store.clone() as Arc<dyn DeviceStore>,
        store as Arc<dyn PollingStore>,
        publisher.clone(),
    );

    let listener = tokio::net::TcpListener::bind(settings.http_listen.as_str()).await?;
    let server_shutdown = shutdown::wait_for_flag(controller.subscribe());
    let serve_result = server::serve(listener, state, server_shutdown).await;

    // --- teardown ---------------------------------------------------------
    controller.trigger();

    if let Err(error) = poller_handle.await {
        tracing::warn!(error = %error, "poller task did not shut down cleanly");
    }

    manager.close_all().await;
    publisher.disconnect().await;
    if let Some(driver) = mqtt_driver {
        driver.abort();
    }

    tracing::info!("fieldgate stopped");
    serve_result.map_err(BinError::from)
}

/// Loads active device rows and converts them, skipping invalid ones.
async fn load_device_configs(store: &PgStore) -> Result<Vec<DeviceConfig>, BinError> {
    let rows = store.list_active_devices().await?;

    let mut configs = Vec::with_capacity(rows.len());
    for row in rows {
        match row.to_config() {
            Ok(config) => configs.push(config),
            Err(error) => {
                tracing::warn!(
                    device_id = %row.device_id,
                    error = %error,
                    "skipping invalid device row"
                );
            }
        }
    }
    Ok(configs)
}
