// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory metrics collector.
//!
//! All counters are atomics so request handlers, the manager and the poller
//! can record concurrently without locks; `snapshot()` reads them on demand
//! for the metrics endpoint. The admin endpoint resets everything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::types::RegisterType;

// =============================================================================
// Modbus metrics
// =============================================================================

#[derive(Debug, Default)]
struct ModbusMetrics {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    latency_us_total: AtomicU64,
    requests_by_type: [AtomicU64; 4],
    errors_by_type: [AtomicU64; 4],
}

impl ModbusMetrics {
    fn record(&self, register_type: RegisterType, success: bool, latency: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.requests_by_type[register_type.index()].fetch_add(1, Ordering::Relaxed);

        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            self.errors_by_type[register_type.index()].fetch_add(1, Ordering::Relaxed);
        }
    }

    fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.success.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.latency_us_total.store(0, Ordering::Relaxed);
        for counter in &self.requests_by_type {
            counter.store(0, Ordering::Relaxed);
        }
        for counter in &self.errors_by_type {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

// =============================================================================
// Polling metrics
// =============================================================================

#[derive(Debug, Default)]
struct PollingMetrics {
    cycles: AtomicU64,
    clean_cycles: AtomicU64,
    targets_polled: AtomicU64,
    targets_success: AtomicU64,
    targets_failed: AtomicU64,
    targets_skipped: AtomicU64,
    cycle_duration_ms_total: AtomicU64,
    last_cycle_duration_ms: AtomicU64,
    last_cycle_time: RwLock<Option<DateTime<Utc>>>,
}

impl PollingMetrics {
    fn record_cycle(&self, success: u64, failed: u64, skipped: u64, duration: Duration) {
        let duration_ms = duration.as_millis() as u64;
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if failed == 0 {
            self.clean_cycles.fetch_add(1, Ordering::Relaxed);
        }
        self.targets_polled.fetch_add(success + failed, Ordering::Relaxed);
        self.targets_success.fetch_add(success, Ordering::Relaxed);
        self.targets_failed.fetch_add(failed, Ordering::Relaxed);
        self.targets_skipped.fetch_add(skipped, Ordering::Relaxed);
        self.cycle_duration_ms_total
            .fetch_add(duration_ms, Ordering::Relaxed);
        self.last_cycle_duration_ms
            .store(duration_ms, Ordering::Relaxed);
        *self.last_cycle_time.write() = Some(Utc::now());
    }

    fn reset(&self) {
        self.cycles.store(0, Ordering::Relaxed);
        self.clean_cycles.store(0, Ordering::Relaxed);
        self.targets_polled.store(0, Ordering::Relaxed);
        self.targets_success.store(0, Ordering::Relaxed);
        self.targets_failed.store(0, Ordering::Relaxed);
        self.targets_skipped.store(0, Ordering::Relaxed);
        self.cycle_duration_ms_total.store(0, Ordering::Relaxed);
        self.last_cycle_duration_ms.store(0, Ordering::Relaxed);
        *self.last_cycle_time.write() = None;
    }
}

// =============================================================================
// MQTT metrics
// =============================================================================

#[derive(Debug, Default)]
struct MqttMetrics {
    published: AtomicU64,
    publish_failures: AtomicU64,
}

// =============================================================================
// MetricsCollector
// =============================================================================

/// Central metrics collector, shared via `Arc`.
pub struct MetricsCollector {
    modbus: ModbusMetrics,
    polling: PollingMetrics,
    mqtt: MqttMetrics,
    started_at: RwLock<DateTime<Utc>>,
}

impl MetricsCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self {
            modbus: ModbusMetrics::default(),
            polling: PollingMetrics::default(),
            mqtt: MqttMetrics::default(),
            started_at: RwLock::new(Utc::now()),
        }
    }

    /// Records one Modbus operation.
    pub fn record_modbus_request(
        &self,
        register_type: RegisterType,
        success: bool,
        latency: Duration,
    ) {
        self.modbus.record(register_type, success, latency);
    }

    /// Records one completed polling cycle.
    pub fn record_poll_cycle(&self, success: u64, failed: u64, skipped: u64, duration: Duration) {
        self.polling.record_cycle(success, failed, skipped, duration);
    }

    /// Records an MQTT publish outcome.
    pub fn record_mqtt_publish(&self, success: bool) {
        if success {
            self.mqtt.published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.mqtt.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of failed MQTT publishes.
    pub fn mqtt_publish_failures(&self) -> u64 {
        self.mqtt.publish_failures.load(Ordering::Relaxed)
    }

    /// Builds a full snapshot; cache counters are supplied by the cache.
    pub fn snapshot(&self, cache: CacheStats) -> MetricsSnapshot {
        let uptime = (Utc::now() - *self.started_at.read())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let total = self.modbus.total.load(Ordering::Relaxed);
        let success = self.modbus.success.load(Ordering::Relaxed);
        let latency_us = self.modbus.latency_us_total.load(Ordering::Relaxed);

        let mut requests_by_type = std::collections::BTreeMap::new();
        let mut errors_by_type = std::collections::BTreeMap::new();
        for rt in RegisterType::ALL {
            let requests = self.modbus.requests_by_type[rt.index()].load(Ordering::Relaxed);
            if requests > 0 {
                requests_by_type.insert(rt.as_str().to_string(), requests);
            }
            let errors = self.modbus.errors_by_type[rt.index()].load(Ordering::Relaxed);
            if errors > 0 {
                errors_by_type.insert(rt.as_str().to_string(), errors);
            }
        }

        let cycles = self.polling.cycles.load(Ordering::Relaxed);
        let targets_polled = self.polling.targets_polled.load(Ordering::Relaxed);
        let targets_success = self.polling.targets_success.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime_seconds: uptime.as_secs_f64(),
            modbus: ModbusSnapshot {
                total_requests: total,
                successful_requests: success,
                failed_requests: self.modbus.failed.load(Ordering::Relaxed),
                success_rate_percent: percent(success, total, 100.0),
                average_latency_ms: if total == 0 {
                    0.0
                } else {
                    round2(latency_us as f64 / total as f64 / 1000.0)
                },
                requests_by_type,
                errors_by_type,
            },
            cache,
            polling: PollingSnapshot {
                total_cycles: cycles,
                clean_cycles: self.polling.clean_cycles.load(Ordering::Relaxed),
                targets_polled,
                targets_success,
                targets_failed: self.polling.targets_failed.load(Ordering::Relaxed),
                targets_skipped: self.polling.targets_skipped.load(Ordering::Relaxed),
                success_rate_percent: percent(targets_success, targets_polled, 100.0),
                average_cycle_duration_ms: if cycles == 0 {
                    0.0
                } else {
                    round2(
                        self.polling.cycle_duration_ms_total.load(Ordering::Relaxed) as f64
                            / cycles as f64,
                    )
                },
                last_cycle_duration_ms: self.polling.last_cycle_duration_ms.load(Ordering::Relaxed),
                last_cycle_time: *self.polling.last_cycle_time.read(),
            },
            mqtt: MqttSnapshot {
                published: self.mqtt.published.load(Ordering::Relaxed),
                publish_failures: self.mqtt.publish_failures.load(Ordering::Relaxed),
            },
        }
    }

    /// Resets every counter and restarts the uptime clock.
    pub fn reset(&self) {
        self.modbus.reset();
        self.polling.reset();
        self.mqtt.published.store(0, Ordering::Relaxed);
        self.mqtt.publish_failures.store(0, Ordering::Relaxed);
        *self.started_at.write() = Utc::now();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("modbus_total", &self.modbus.total.load(Ordering::Relaxed))
            .field("cycles", &self.polling.cycles.load(Ordering::Relaxed))
            .finish()
    }
}

fn percent(part: u64, total: u64, when_empty: f64) -> f64 {
    if total == 0 {
        when_empty
    } else {
        round2(part as f64 / total as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Snapshot types
// =============================================================================

/// Full metrics snapshot as served on the API.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since start (or last reset).
    pub uptime_seconds: f64,
    /// Modbus operation counters.
    pub modbus: ModbusSnapshot,
    /// Cache counters.
    pub cache: CacheStats,
    /// Polling counters.
    pub polling: PollingSnapshot,
    /// MQTT publish counters.
    pub mqtt: MqttSnapshot,
}

/// Modbus section of the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ModbusSnapshot {
    /// All operations.
    pub total_requests: u64,
    /// Operations that returned values.
    pub successful_requests: u64,
    /// Operations that surfaced an error.
    pub failed_requests: u64,
    /// Success percentage (100 when idle).
    pub success_rate_percent: f64,
    /// Running mean latency.
    pub average_latency_ms: f64,
    /// Requests per register space.
    pub requests_by_type: std::collections::BTreeMap<String, u64>,
    /// Errors per register space.
    pub errors_by_type: std::collections::BTreeMap<String, u64>,
}

/// Polling section of the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PollingSnapshot {
    /// Completed cycles.
    pub total_cycles: u64,
    /// Cycles without a single target failure.
    pub clean_cycles: u64,
    /// Targets attempted.
    pub targets_polled: u64,
    /// Targets read successfully.
    pub targets_success: u64,
    /// Targets that failed.
    pub targets_failed: u64,
    /// Targets skipped (unknown or inactive device).
    pub targets_skipped: u64,
    /// Per-target success percentage (100 when idle).
    pub success_rate_percent: f64,
    /// Mean cycle duration.
    pub average_cycle_duration_ms: f64,
    /// Duration of the most recent cycle.
    pub last_cycle_duration_ms: u64,
    /// Completion time of the most recent cycle.
    pub last_cycle_time: Option<DateTime<Utc>>,
}

/// MQTT section of the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MqttSnapshot {
    /// Samples handed to the client.
    pub published: u64,
    /// Publish attempts that failed.
    pub publish_failures: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_cache_stats() -> CacheStats {
        CacheStats {
            entries: 0,
            hits: 0,
            misses: 0,
            sets: 0,
            evictions: 0,
            hit_rate_percent: 0.0,
        }
    }

    #[test]
    fn modbus_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_modbus_request(RegisterType::Holding, true, Duration::from_millis(10));
        metrics.record_modbus_request(RegisterType::Holding, true, Duration::from_millis(20));
        metrics.record_modbus_request(RegisterType::Coil, false, Duration::from_millis(30));

        let snap = metrics.snapshot(empty_cache_stats());
        assert_eq!(snap.modbus.total_requests, 3);
        assert_eq!(snap.modbus.successful_requests, 2);
        assert_eq!(snap.modbus.failed_requests, 1);
        assert_eq!(snap.modbus.average_latency_ms, 20.0);
        assert_eq!(snap.modbus.success_rate_percent, 66.67);
        assert_eq!(snap.modbus.requests_by_type["holding"], 2);
        assert_eq!(snap.modbus.errors_by_type["coil"], 1);
        assert!(!snap.modbus.errors_by_type.contains_key("holding"));
    }

    #[test]
    fn idle_rates_are_100() {
        let metrics = MetricsCollector::new();
        let snap = metrics.snapshot(empty_cache_stats());
        assert_eq!(snap.modbus.success_rate_percent, 100.0);
        assert_eq!(snap.polling.success_rate_percent, 100.0);
    }

    #[test]
    fn polling_cycle_accounting() {
        let metrics = MetricsCollector::new();
        metrics.record_poll_cycle(4, 1, 2, Duration::from_millis(250));
        metrics.record_poll_cycle(5, 0, 0, Duration::from_millis(150));

        let snap = metrics.snapshot(empty_cache_stats());
        assert_eq!(snap.polling.total_cycles, 2);
        assert_eq!(snap.polling.clean_cycles, 1);
        assert_eq!(snap.polling.targets_polled, 10);
        assert_eq!(snap.polling.targets_success, 9);
        assert_eq!(snap.polling.targets_failed, 1);
        assert_eq!(snap.polling.targets_skipped, 2);
        assert_eq!(snap.polling.average_cycle_duration_ms, 200.0);
        assert_eq!(snap.polling.last_cycle_duration_ms, 150);
        assert!(snap.polling.last_cycle_time.is_some());
        assert_eq!(snap.polling.success_rate_percent, 90.0);
    }

    #[test]
    fn mqtt_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_mqtt_publish(true);
        metrics.record_mqtt_publish(false);
        metrics.record_mqtt_publish(false);

        let snap = metrics.snapshot(empty_cache_stats());
        assert_eq!(snap.mqtt.published, 1);
        assert_eq!(snap.mqtt.publish_failures, 2);
        assert_eq!(metrics.mqtt_publish_failures(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let metrics = MetricsCollector::new();
        metrics.record_modbus_request(RegisterType::Input, true, Duration::from_millis(5));
        metrics.record_poll_cycle(1, 0, 0, Duration::from_millis(10));
        metrics.record_mqtt_publish(false);

        metrics.reset();

        let snap = metrics.snapshot(empty_cache_stats());
        assert_eq!(snap.modbus.total_requests, 0);
        assert_eq!(snap.polling.total_cycles, 0);
        assert_eq!(snap.mqtt.publish_failures, 0);
        assert!(snap.polling.last_cycle_time.is_none());
    }

    #[test]
    fn snapshot_serializes() {
        let metrics = MetricsCollector::new();
        let json = serde_json::to_value(metrics.snapshot(empty_cache_stats())).unwrap();
        assert!(json.get("uptime_seconds").is_some());
        assert!(json["modbus"].get("average_latency_ms").is_some());
        assert!(json["polling"].get("targets_skipped").is_some());
    }
}
