// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Manager integration tests: serialization, circuit breaking, reload.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use fieldgate_core::circuit_breaker::CircuitBreakerConfig;
use fieldgate_core::error::CoreError;
use fieldgate_core::types::{DeviceId, GatewayKey, RegisterType};
use fieldgate_tests::common::builders::{device_config, Harness};

#[tokio::test]
async fn shared_gateway_serializes_concurrent_reads() {
    let harness = Harness::with_devices(vec![
        device_config("d1", "h1", 1),
        device_config("d2", "h1", 2),
    ]);
    let key = GatewayKey::new("h1", 5020);

    let started = Instant::now();
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..10u16 {
        let manager = harness.manager.clone();
        let device = if i % 2 == 0 { "d1" } else { "d2" };
        tasks.spawn(async move {
            manager
                .read(&DeviceId::new(device), RegisterType::Holding, i, 1)
                .await
        });
    }

    let mut ok = 0;
    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().is_ok());
        ok += 1;
    }
    assert_eq!(ok, 10);

    let activity = harness.network.activity(&key);
    assert_eq!(
        activity.overlaps.load(Ordering::SeqCst),
        0,
        "two frames were in flight on one gateway"
    );
    assert_eq!(activity.total.load(Ordering::SeqCst), 10);

    // Serialized: total wall clock is roughly 10x the per-read latency.
    assert!(started.elapsed() >= harness.network.request_delay * 8);
}

#[tokio::test]
async fn breaker_trips_fails_fast_and_recovers() {
    let harness = Harness::new(
        vec![device_config("d1", "down-host", 1)],
        CircuitBreakerConfig::new(5, Duration::from_millis(200)),
    );
    let id = DeviceId::new("d1");
    let key = GatewayKey::new("down-host", 5020);

    harness.network.set_unreachable(&key, true);

    // Five sequential transport failures open the circuit.
    for _ in 0..5 {
        let err = harness
            .manager
            .read(&id, RegisterType::Holding, 0, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Transport { .. }));
    }

    // The sixth call is rejected without touching the network.
    let started = Instant::now();
    let err = harness
        .manager
        .read(&id, RegisterType::Holding, 0, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CircuitOpen { .. }));
    assert!(started.elapsed() < Duration::from_millis(50));

    let status = &harness.manager.gateways_status()[0];
    assert_eq!(status.circuit_state.as_str(), "open");

    // Reachability restored + cooldown elapsed: the probe closes the circuit.
    harness.network.set_unreachable(&key, false);
    tokio::time::sleep(Duration::from_millis(300)).await;

    harness
        .manager
        .read(&id, RegisterType::Holding, 0, 1)
        .await
        .expect("probe read should succeed after recovery");

    let status = &harness.manager.gateways_status()[0];
    assert_eq!(status.circuit_state.as_str(), "closed");
}

#[tokio::test]
async fn circuit_open_error_carries_retry_after() {
    let harness = Harness::new(
        vec![device_config("d1", "down-host", 1)],
        CircuitBreakerConfig::new(1, Duration::from_secs(30)),
    );
    let id = DeviceId::new("d1");
    harness
        .network
        .set_unreachable(&GatewayKey::new("down-host", 5020), true);

    let _ = harness.manager.read(&id, RegisterType::Holding, 0, 1).await;

    match harness
        .manager
        .read(&id, RegisterType::Holding, 0, 1)
        .await
        .unwrap_err()
    {
        CoreError::CircuitOpen { gateway, retry_after } => {
            assert_eq!(gateway, "down-host:5020");
            assert!(retry_after > Duration::from_secs(25));
        }
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
}

#[tokio::test]
async fn reload_drops_unreferenced_gateways() {
    let harness = Harness::with_devices(vec![
        device_config("d1", "h1", 1),
        device_config("d2", "h2", 1),
    ]);

    for device in ["d1", "d2"] {
        harness
            .manager
            .read(&DeviceId::new(device), RegisterType::Holding, 0, 1)
            .await
            .unwrap();
    }
    assert_eq!(harness.manager.gateways_status().len(), 2);

    harness.manager.reload(vec![device_config("d1", "h1", 1)]).await;

    let statuses = harness.manager.gateways_status();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].host, "h1");

    let err = harness
        .manager
        .read(&DeviceId::new("d2"), RegisterType::Holding, 0, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn write_then_read_roundtrip() {
    let harness = Harness::with_devices(vec![device_config("d1", "h1", 1)]);
    let id = DeviceId::new("d1");

    harness
        .manager
        .write(&id, RegisterType::Holding, 40, 1234)
        .await
        .unwrap();

    let values = harness
        .manager
        .read(&id, RegisterType::Holding, 40, 1)
        .await
        .unwrap();
    assert_eq!(values, vec![1234]);
}

#[tokio::test]
async fn coil_reads_come_back_as_bits() {
    let harness = Harness::with_devices(vec![device_config("d1", "h1", 1)]);
    let id = DeviceId::new("d1");
    let key = GatewayKey::new("h1", 5020);

    harness.network.set_register(&key, 1, RegisterType::Coil, 2, 1);

    let values = harness
        .manager
        .read(&id, RegisterType::Coil, 0, 4)
        .await
        .unwrap();
    assert_eq!(values, vec![0, 0, 1, 0]);
}
