// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Poller integration tests: cache fill, ordering, MQTT resilience.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use fieldgate_core::types::{DeviceId, GatewayKey, RegisterType};
use fieldgate_mqtt::{MqttPublisher, MqttSettings};
use fieldgate_poller::Poller;
use fieldgate_store::PollingStore;
use fieldgate_tests::common::builders::{device_config, target_record, Harness};

/// Runs the poller long enough for at least one cycle, then stops it.
async fn run_one_cycle(harness: &Harness, publisher: Arc<MqttPublisher>) {
    let (tx, rx) = watch::channel(false);
    let poller = Poller::new(
        harness.manager.clone(),
        harness.cache.clone(),
        harness.store.clone() as Arc<dyn PollingStore>,
        publisher,
        harness.metrics.clone(),
        Duration::from_secs(5),
        rx,
    );

    let handle = tokio::spawn(poller.run());
    // The first cycle starts immediately; give it room to finish.
    tokio::time::sleep(Duration::from_millis(400)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller should stop")
        .unwrap();
}

#[tokio::test]
async fn poll_cycle_fills_cache_and_counts() {
    let harness = Harness::with_devices(vec![
        device_config("d1", "h1", 1),
        device_config("d2", "h2", 1),
    ]);
    let h1 = GatewayKey::new("h1", 5020);
    harness.network.set_register(&h1, 1, RegisterType::Holding, 0, 11);

    harness.store.insert_target(target_record("d1", 0, 5));
    harness.store.insert_target(target_record("d2", 100, 2));

    run_one_cycle(&harness, harness.publisher.clone()).await;

    let entry = harness
        .cache
        .get(&DeviceId::new("d1"), RegisterType::Holding, 0, 5)
        .expect("polled range should be cached");
    assert_eq!(entry.values, vec![11, 0, 0, 0, 0]);
    assert!(entry.age() < Duration::from_secs(5));

    assert!(harness
        .cache
        .get(&DeviceId::new("d2"), RegisterType::Holding, 100, 2)
        .is_some());

    let snap = harness.metrics.snapshot(harness.cache.stats());
    assert!(snap.polling.total_cycles >= 1);
    assert_eq!(snap.polling.targets_failed, 0);
    assert!(snap.polling.targets_success >= 2);
}

#[tokio::test]
async fn targets_on_one_gateway_polled_in_row_order() {
    let harness = Harness::with_devices(vec![device_config("d1", "h1", 1)]);

    // Insertion order intentionally not sorted by address.
    harness.store.insert_target(target_record("d1", 30, 1));
    harness.store.insert_target(target_record("d1", 10, 1));
    harness.store.insert_target(target_record("d1", 20, 1));

    run_one_cycle(&harness, harness.publisher.clone()).await;

    let addresses: Vec<u16> = harness
        .network
        .request_log()
        .into_iter()
        .filter(|(gateway, _)| gateway == "h1:5020")
        .map(|(_, address)| address)
        .collect();

    // One full cycle reads in row-id order; further cycles repeat it.
    assert!(addresses.len() >= 3);
    assert_eq!(&addresses[..3], &[30, 10, 20]);
}

#[tokio::test]
async fn unknown_device_targets_are_skipped() {
    let harness = Harness::with_devices(vec![device_config("d1", "h1", 1)]);

    harness.store.insert_target(target_record("d1", 0, 1));
    harness.store.insert_target(target_record("ghost", 0, 1));

    run_one_cycle(&harness, harness.publisher.clone()).await;

    let snap = harness.metrics.snapshot(harness.cache.stats());
    assert!(snap.polling.targets_skipped >= 1);
    assert!(snap.polling.targets_success >= 1);
    assert_eq!(snap.polling.targets_failed, 0);
}

#[tokio::test]
async fn polling_survives_a_dead_mqtt_broker() {
    let harness = Harness::with_devices(vec![device_config("d1", "h1", 1)]);
    harness.store.insert_target(target_record("d1", 0, 3));

    // Nothing listens on port 1; publishes are queued/dropped while the
    // driver retries in the background.
    let (publisher, driver) = MqttPublisher::connect(
        MqttSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: None,
            password: None,
            topic_prefix: "modbus/data".to_string(),
        },
        harness.metrics.clone(),
    );

    run_one_cycle(&harness, Arc::new(publisher)).await;
    driver.abort();

    // The cache was refreshed regardless of the broker being down.
    assert!(harness
        .cache
        .get(&DeviceId::new("d1"), RegisterType::Holding, 0, 3)
        .is_some());

    let snap = harness.metrics.snapshot(harness.cache.stats());
    assert_eq!(snap.polling.targets_failed, 0);
    assert!(snap.polling.targets_success >= 1);
}

#[tokio::test]
async fn repolling_updates_timestamp_keeps_values() {
    let harness = Harness::with_devices(vec![device_config("d1", "h1", 1)]);
    let key = GatewayKey::new("h1", 5020);
    harness.network.set_register(&key, 1, RegisterType::Holding, 7, 42);
    harness.store.insert_target(target_record("d1", 7, 1));

    run_one_cycle(&harness, harness.publisher.clone()).await;
    let first = harness
        .cache
        .get(&DeviceId::new("d1"), RegisterType::Holding, 7, 1)
        .unwrap();

    run_one_cycle(&harness, harness.publisher.clone()).await;
    let second = harness
        .cache
        .get(&DeviceId::new("d1"), RegisterType::Holding, 7, 1)
        .unwrap();

    assert_eq!(first.values, vec![42]);
    assert_eq!(second.values, vec![42]);
    assert!(second.cached_at >= first.cached_at);
}
