// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The polling service.
//!
//! One cycle:
//!
//! 1. Load the active targets (stable order by row id) — this is the hot
//!    reload; admin changes are picked up on the next tick.
//! 2. Resolve each target against the manager's device snapshot; targets
//!    whose device is unknown are counted as skipped.
//! 3. Group targets by gateway key. One sequential worker per group keeps
//!    the per-gateway serialization invariant; groups run concurrently.
//! 4. Per target: read through the manager; on success update the cache
//!    and publish to MQTT; on failure log, count, continue.
//! 5. Record cycle duration and success counts, sweep expired cache
//!    entries, then sleep out the remainder of the interval. A cycle that
//!    overruns the interval is followed immediately by the next one —
//!    cycles never overlap.
//!
//! Errors never propagate out of the poller; a failing database or device
//! only shows up in the logs and the metrics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinSet;

use fieldgate_core::cache::RegisterCache;
use fieldgate_core::metrics::MetricsCollector;
use fieldgate_core::types::{DeviceConfig, GatewayKey, PollingTarget};
use fieldgate_modbus::ModbusManager;
use fieldgate_mqtt::{MqttPublisher, Sample};
use fieldgate_store::PollingStore;

// =============================================================================
// Poller
// =============================================================================

/// The background polling scheduler.
pub struct Poller {
    manager: Arc<ModbusManager>,
    cache: Arc<RegisterCache>,
    store: Arc<dyn PollingStore>,
    publisher: Arc<MqttPublisher>,
    metrics: Arc<MetricsCollector>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Poller {
    /// Creates a poller. `shutdown` flips to `true` to stop the loop.
    pub fn new(
        manager: Arc<ModbusManager>,
        cache: Arc<RegisterCache>,
        store: Arc<dyn PollingStore>,
        publisher: Arc<MqttPublisher>,
        metrics: Arc<MetricsCollector>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let interval = interval.max(Duration::from_secs(1));
        Self {
            manager,
            cache,
            store,
            publisher,
            metrics,
            interval,
            shutdown,
        }
    }

    /// Runs until the shutdown signal flips.
    pub async fn run(mut self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "poller started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            self.run_cycle().await;
            let elapsed = started.elapsed();

            if elapsed >= self.interval {
                tracing::warn!(
                    cycle_ms = elapsed.as_millis() as u64,
                    interval_ms = self.interval.as_millis() as u64,
                    "poll cycle overran the interval, starting next cycle immediately"
                );
                continue;
            }

            let sleep = self.interval - elapsed;
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                changed = self.shutdown.changed() => {
                    // A dropped sender counts as shutdown.
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("poller stopped");
    }

    async fn run_cycle(&self) {
        let started = Instant::now();

        let rows = match self.store.list_active_targets().await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(error = %error, "failed to load polling targets, skipping cycle");
                return;
            }
        };

        let devices = self.manager.device_snapshot();
        let (groups, skipped) = group_by_gateway(&rows, &devices);

        let mut join_set = JoinSet::new();
        for (gateway, targets) in groups {
            let manager = self.manager.clone();
            let cache = self.cache.clone();
            let publisher = self.publisher.clone();
            let shutdown = self.shutdown.clone();
            join_set.spawn(async move {
                poll_group(gateway, targets, manager, cache, publisher, shutdown).await
            });
        }

        let mut success = 0u64;
        let mut failed = 0u64;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((group_success, group_failed)) => {
                    success += group_success;
                    failed += group_failed;
                }
                Err(error) => {
                    tracing::error!(error = %error, "poll worker panicked");
                }
            }
        }

        self.cache.sweep_expired();

        let duration = started.elapsed();
        self.metrics
            .record_poll_cycle(success, failed, skipped, duration);

        tracing::debug!(
            success,
            failed,
            skipped,
            duration_ms = duration.as_millis() as u64,
            "poll cycle complete"
        );
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Cycle helpers
// =============================================================================

/// Resolves rows against the device snapshot and groups them by gateway,
/// preserving row order (stable by id) inside each group.
///
/// Returns the groups and the number of skipped targets (invalid rows or
/// targets whose device is not in the active map).
fn group_by_gateway(
    rows: &[fieldgate_store::PollingTargetRecord],
    devices: &HashMap<String, DeviceConfig>,
) -> (Vec<(GatewayKey, Vec<PollingTarget>)>, u64) {
    let mut groups: Vec<(GatewayKey, Vec<PollingTarget>)> = Vec::new();
    let mut index: HashMap<GatewayKey, usize> = HashMap::new();
    let mut skipped = 0u64;

    for row in rows {
        let target = match row.to_target() {
            Ok(target) => target,
            Err(error) => {
                tracing::warn!(target_id = row.id, error = %error, "invalid polling target, skipped");
                skipped += 1;
                continue;
            }
        };

        let Some(device) = devices.get(target.device_id.as_str()) else {
            tracing::debug!(
                target_id = target.id,
                device_id = %target.device_id,
                "polling target references an unknown or inactive device, skipped"
            );
            skipped += 1;
            continue;
        };

        let key = device.gateway_key();
        match index.get(&key) {
            Some(&slot) => groups[slot].1.push(target),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![target]));
            }
        }
    }

    (groups, skipped)
}

/// Sequentially polls one gateway group.
async fn poll_group(
    gateway: GatewayKey,
    targets: Vec<PollingTarget>,
    manager: Arc<ModbusManager>,
    cache: Arc<RegisterCache>,
    publisher: Arc<MqttPublisher>,
    shutdown: watch::Receiver<bool>,
) -> (u64, u64) {
    let mut success = 0u64;
    let mut failed = 0u64;

    for target in targets {
        if *shutdown.borrow() {
            break;
        }

        match manager
            .read(
                &target.device_id,
                target.register_type,
                target.address,
                target.count,
            )
            .await
        {
            Ok(values) => {
                cache.set(
                    target.device_id.clone(),
                    target.register_type,
                    target.address,
                    target.count,
                    values.clone(),
                );
                let sample = Sample::now(
                    target.device_id.clone(),
                    target.register_type,
                    target.address,
                    target.count,
                    values,
                );
                publisher.publish(&sample).await;
                success += 1;
            }
            Err(error) => {
                tracing::warn!(
                    target_id = target.id,
                    device_id = %target.device_id,
                    register_type = %target.register_type,
                    address = target.address,
                    count = target.count,
                    gateway = %gateway,
                    error = %error,
                    "polling target failed"
                );
                failed += 1;
            }
        }
    }

    (success, failed)
}

// =============================================================================
// Tests
// =============================================================================
