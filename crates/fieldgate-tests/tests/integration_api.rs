// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API integration tests: validation, cache semantics, admin CRUD, health.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use fieldgate_api::build_router;
use fieldgate_core::types::{DeviceId, GatewayKey, RegisterType};
use fieldgate_tests::common::builders::{device_config, device_record, Harness};

async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn harness() -> Harness {
    Harness::with_devices(vec![device_config("d1", "h1", 1)])
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn read_count_boundaries() {
    let harness = harness();
    let router = build_router(harness.app_state());

    let (status, body) = send(
        router.clone(),
        "GET",
        "/api/devices/d1/registers?address=0&count=126",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = send(
        router.clone(),
        "GET",
        "/api/devices/d1/registers?address=0&count=0",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        router,
        "GET",
        "/api/devices/d1/registers?address=0&count=125",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["values"].as_array().unwrap().len(), 125);
}

#[tokio::test]
async fn write_validation() {
    let harness = harness();
    let router = build_router(harness.app_state());

    // Read-only space.
    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/devices/d1/registers/write",
        Some(json!({"address": 0, "value": 1, "register_type": "input"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // Coils only take 0/1.
    let (status, _) = send(
        router.clone(),
        "POST",
        "/api/devices/d1/registers/write",
        Some(json!({"address": 0, "value": 2, "register_type": "coil"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Holding values are 16-bit.
    let (status, _) = send(
        router,
        "POST",
        "/api/devices/d1/registers/write",
        Some(json!({"address": 0, "value": 65536, "register_type": "holding"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_device_is_404() {
    let harness = harness();
    let router = build_router(harness.app_state());

    let (status, body) = send(
        router,
        "GET",
        "/api/devices/ghost/registers?address=0&count=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

// =============================================================================
// Cache semantics
// =============================================================================

#[tokio::test]
async fn cache_hit_returns_cached_values_without_io() {
    let harness = harness();
    harness.cache.set(
        DeviceId::new("d1"),
        RegisterType::Holding,
        0,
        5,
        vec![1, 2, 3, 4, 5],
    );
    let router = build_router(harness.app_state());

    let (status, body) = send(
        router,
        "GET",
        "/api/devices/d1/registers?address=0&count=5&source=cache",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "cache");
    assert_eq!(body["values"], json!([1, 2, 3, 4, 5]));
    assert!(body["cached_at"].is_string());

    // No frame went out for the hit.
    let activity = harness.network.activity(&GatewayKey::new("h1", 5020));
    assert_eq!(activity.total.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cache_miss_falls_back_to_live() {
    let harness = harness();
    harness
        .network
        .set_register(&GatewayKey::new("h1", 5020), 1, RegisterType::Holding, 10, 77);
    let router = build_router(harness.app_state());

    let (status, body) = send(
        router,
        "GET",
        "/api/devices/d1/registers?address=10&count=1&source=cache",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "live");
    assert_eq!(body["values"], json!([77]));
    assert!(body.get("cached_at").is_none());
}

#[tokio::test]
async fn write_invalidates_overlapping_cache() {
    let harness = harness();
    // Stale value as if a poll had cached it.
    harness
        .cache
        .set(DeviceId::new("d1"), RegisterType::Holding, 10, 1, vec![7]);
    let router = build_router(harness.app_state());

    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/devices/d1/registers/write",
        Some(json!({"address": 10, "value": 99, "register_type": "holding"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // The stale entry is gone; source=cache goes live and sees the new value.
    let (status, body) = send(
        router,
        "GET",
        "/api/devices/d1/registers?address=10&count=1&source=cache",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "live");
    assert_eq!(body["values"], json!([99]));
}

// =============================================================================
// Admin CRUD
// =============================================================================

#[tokio::test]
async fn device_create_validates_and_conflicts() {
    let harness = harness();
    let router = build_router(harness.app_state());

    // Out-of-spec slave id.
    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/admin/devices",
        Some(json!({"device_id": "d9", "host": "h9", "port": 502, "slave_id": 248})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // Unknown framer is rejected by the closed enum.
    let (status, _) = send(
        router.clone(),
        "POST",
        "/api/admin/devices",
        Some(json!({"device_id": "d9", "host": "h9", "port": 502, "slave_id": 1, "framer": "TLS"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Valid create.
    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/admin/devices",
        Some(json!({"device_id": "d9", "host": "h9", "port": 502, "slave_id": 247})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["device_id"], "d9");
    assert_eq!(body["framer"], "RTU");

    // Duplicate id.
    let (status, body) = send(
        router,
        "POST",
        "/api/admin/devices",
        Some(json!({"device_id": "d9", "host": "other", "port": 502, "slave_id": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn device_soft_delete_flow() {
    let harness = harness();
    harness.store.insert_device(device_record("d2", "h2", 1));
    let router = build_router(harness.app_state());

    let (status, _) = send(router.clone(), "DELETE", "/api/admin/devices/d2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The row survives, flagged inactive.
    let (status, body) = send(router.clone(), "GET", "/api/admin/devices/d2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (_, body) = send(router.clone(), "GET", "/api/admin/devices/active", None).await;
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|row| row["device_id"] != "d2"));

    // Reactivate.
    let (status, body) = send(
        router,
        "POST",
        "/api/admin/devices/d2/activate",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn polling_target_create_checks_device() {
    let harness = harness();
    harness.store.insert_device(device_record("d1", "h1", 1));
    let router = build_router(harness.app_state());

    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/admin/polling",
        Some(json!({"device_id": "ghost", "register_type": "holding", "address": 0, "count": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(
        router.clone(),
        "POST",
        "/api/admin/polling",
        Some(json!({"device_id": "d1", "register_type": "holding", "address": 0, "count": 126})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        router,
        "POST",
        "/api/admin/polling",
        Some(json!({"device_id": "d1", "register_type": "holding", "address": 0, "count": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn reload_updates_manager_devices() {
    let harness = harness();
    harness.store.insert_device(device_record("d3", "h3", 1));
    let router = build_router(harness.app_state());

    assert_eq!(harness.manager.device_count(), 1);

    let (status, body) = send(router.clone(), "POST", "/api/admin/devices/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["devices"], json!(["d3"]));

    // The manager now routes the DB device set; d1 is gone.
    assert_eq!(harness.manager.device_count(), 1);
    let (status, _) = send(
        router,
        "GET",
        "/api/devices/d1/registers?address=0&count=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Cache admin, metrics, health, gateways
// =============================================================================

#[tokio::test]
async fn cache_admin_endpoints() {
    let harness = harness();
    harness
        .cache
        .set(DeviceId::new("d1"), RegisterType::Holding, 0, 2, vec![5, 6]);
    let router = build_router(harness.app_state());

    let (status, body) = send(router.clone(), "GET", "/api/admin/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["key"], "d1:holding:0:2");
    assert!(entries[0]["age_seconds"].as_f64().unwrap() >= 0.0);

    let (status, body) = send(router.clone(), "GET", "/api/admin/cache/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_entries"], 1);
    assert_eq!(body["devices"], json!(["d1"]));

    let (status, body) = send(router.clone(), "GET", "/api/admin/cache/device/d1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(router, "DELETE", "/api/admin/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);
}

#[tokio::test]
async fn metrics_snapshot_and_reset() {
    let harness = harness();
    let router = build_router(harness.app_state());

    // Generate one live read worth of counters.
    let (status, _) = send(
        router.clone(),
        "GET",
        "/api/devices/d1/registers?address=0&count=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(router.clone(), "GET", "/api/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modbus"]["total_requests"], 1);
    assert_eq!(body["modbus"]["successful_requests"], 1);
    assert_eq!(body["cache"]["sets"], 1);
    assert!(body["uptime_seconds"].as_f64().unwrap() >= 0.0);

    let (status, _) = send(router.clone(), "POST", "/api/metrics/reset", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(router, "GET", "/api/metrics", None).await;
    assert_eq!(body["modbus"]["total_requests"], 0);
    assert_eq!(body["cache"]["sets"], 0);
}

#[tokio::test]
async fn health_reports_ok() {
    let harness = harness();
    let router = build_router(harness.app_state());

    let (status, body) = send(router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let components = body["components"].as_array().unwrap();
    assert!(components.iter().any(|c| c["name"] == "database"));
    assert!(components.iter().any(|c| c["name"] == "mqtt"));
}

#[tokio::test]
async fn gateways_reflect_connection_state() {
    let harness = harness();
    let router = build_router(harness.app_state());

    let (_, body) = send(router.clone(), "GET", "/api/devices/gateways", None).await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (status, _) = send(
        router.clone(),
        "GET",
        "/api/devices/d1/registers?address=0&count=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(router, "GET", "/api/devices/gateways", None).await;
    let gateways = body.as_array().unwrap();
    assert_eq!(gateways.len(), 1);
    assert_eq!(gateways[0]["host"], "h1");
    assert_eq!(gateways[0]["port"], 5020);
    assert_eq!(gateways[0]["connected"], true);
    assert_eq!(gateways[0]["circuit_state"], "closed");
}

#[tokio::test]
async fn device_listing_shows_gateway() {
    let harness = harness();
    let router = build_router(harness.app_state());

    let (status, body) = send(router, "GET", "/api/devices", None).await;
    assert_eq!(status, StatusCode::OK);
    let devices = body.as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["device_id"], "d1");
    assert_eq!(devices[0]["gateway"], "h1:5020");
}
