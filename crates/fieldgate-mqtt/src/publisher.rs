// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! MQTT publisher.
//!
//! Topic: `{prefix}/{device_id}/{register_type}/{address}`, QoS 0, no
//! retained messages. Payload:
//!
//! ```json
//! {
//!   "device_id": "d1",
//!   "register_type": "holding",
//!   "address": 0,
//!   "count": 5,
//!   "values": [1, 2, 3, 4, 5],
//!   "timestamp": 1735689600.25
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use tokio::task::JoinHandle;

use fieldgate_core::metrics::MetricsCollector;
use fieldgate_core::types::{DeviceId, RegisterType};

// =============================================================================
// Settings
// =============================================================================

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// Topic prefix, trailing slashes ignored.
    pub topic_prefix: String,
}

// =============================================================================
// Sample
// =============================================================================

/// One polled register range, ready for publication.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    /// Device the values belong to.
    pub device_id: DeviceId,
    /// Register space that was read.
    pub register_type: RegisterType,
    /// Start address.
    pub address: u16,
    /// Number of items.
    pub count: u16,
    /// The values, bit spaces as 0/1.
    pub values: Vec<u16>,
    /// Unix timestamp, seconds with fractional part.
    pub timestamp: f64,
}

impl Sample {
    /// Builds a sample stamped with the current time.
    pub fn now(
        device_id: DeviceId,
        register_type: RegisterType,
        address: u16,
        count: u16,
        values: Vec<u16>,
    ) -> Self {
        Self {
            device_id,
            register_type,
            address,
            count,
            values,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Builds the topic for a sample under `prefix`.
pub fn topic_for(prefix: &str, sample: &Sample) -> String {
    format!(
        "{}/{}/{}/{}",
        prefix.trim_end_matches('/'),
        sample.device_id,
        sample.register_type,
        sample.address
    )
}

// =============================================================================
// MqttPublisher
// =============================================================================

struct Inner {
    client: AsyncClient,
    topic_prefix: String,
    connected: Arc<AtomicBool>,
}

/// Fire-and-forget sample publisher.
pub struct MqttPublisher {
    inner: Option<Inner>,
    metrics: Arc<MetricsCollector>,
}

impl MqttPublisher {
    /// Creates a no-op publisher (broker not configured).
    pub fn disabled(metrics: Arc<MetricsCollector>) -> Self {
        tracing::info!("MQTT broker not configured, publisher disabled");
        Self {
            inner: None,
            metrics,
        }
    }

    /// Creates a connected publisher and spawns the event-loop driver.
    ///
    /// The returned handle owns the driver task; abort it on shutdown after
    /// [`disconnect`](Self::disconnect).
    pub fn connect(settings: MqttSettings, metrics: Arc<MetricsCollector>) -> (Self, JoinHandle<()>) {
        let client_id = format!("fieldgate-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, settings.host.clone(), settings.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let connected = Arc::new(AtomicBool::new(false));

        tracing::info!(
            broker = %settings.host,
            port = settings.port,
            "MQTT publisher configured"
        );

        let driver = tokio::spawn(drive_event_loop(eventloop, connected.clone()));

        (
            Self {
                inner: Some(Inner {
                    client,
                    topic_prefix: settings.topic_prefix.trim_end_matches('/').to_string(),
                    connected,
                }),
                metrics,
            },
            driver,
        )
    }

    /// Returns `true` when a broker is configured.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Returns `true` while the broker session is up (always `true` when
    /// disabled, so health checks only gate on configured brokers).
    pub fn is_connected(&self) -> bool {
        match &self.inner {
            Some(inner) => inner.connected.load(Ordering::Relaxed),
            None => true,
        }
    }

    /// Publishes one sample. Never fails: errors are logged and counted.
    pub async fn publish(&self, sample: &Sample) {
        let Some(inner) = &self.inner else {
            return;
        };

        let topic = topic_for(&inner.topic_prefix, sample);
        let payload = match serde_json::to_vec(sample) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(error = %error, "failed to serialize MQTT sample");
                self.metrics.record_mqtt_publish(false);
                return;
            }
        };

        match inner
            .client
            .try_publish(topic.as_str(), QoS::AtMostOnce, false, payload)
        {
            Ok(()) => {
                tracing::trace!(topic = %topic, "published sample");
                self.metrics.record_mqtt_publish(true);
            }
            Err(error) => {
                tracing::warn!(topic = %topic, error = %error, "MQTT publish failed");
                self.metrics.record_mqtt_publish(false);
            }
        }
    }

    /// Disconnects cleanly. No-op when disabled.
    pub async fn disconnect(&self) {
        if let Some(inner) = &self.inner {
            if let Err(error) = inner.client.disconnect().await {
                tracing::debug!(error = %error, "error disconnecting MQTT client");
            }
        }
    }
}

impl std::fmt::Debug for MqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttPublisher")
            .field("enabled", &self.is_enabled())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Keeps the rumqttc event loop turning; reconnects with exponential
/// backoff after poll errors.
async fn drive_event_loop(mut eventloop: EventLoop, connected: Arc<AtomicBool>) {
    const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
    const MAX_BACKOFF: Duration = Duration::from_secs(60);

    let mut backoff = INITIAL_BACKOFF;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("connected to MQTT broker");
                connected.store(true, Ordering::Relaxed);
                backoff = INITIAL_BACKOFF;
            }
            Ok(_) => {}
            Err(error) => {
                if connected.swap(false, Ordering::Relaxed) {
                    tracing::warn!(error = %error, "MQTT connection lost");
                } else {
                    tracing::debug!(error = %error, backoff_secs = backoff.as_secs(), "MQTT reconnect pending");
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
