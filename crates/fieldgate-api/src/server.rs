// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Router assembly and serving.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Observability
        .route("/health", get(handlers::health))
        .route("/api/metrics", get(handlers::get_metrics))
        .route("/api/metrics/reset", post(handlers::reset_metrics))
        // Device data plane
        .route("/api/devices", get(handlers::list_devices))
        .route("/api/devices/gateways", get(handlers::list_gateways))
        .route(
            "/api/devices/{device_id}/registers",
            get(handlers::read_registers),
        )
        .route(
            "/api/devices/{device_id}/registers/write",
            post(handlers::write_register),
        )
        // Admin: devices
        .route(
            "/api/admin/devices",
            get(handlers::admin_list_devices).post(handlers::admin_create_device),
        )
        .route(
            "/api/admin/devices/active",
            get(handlers::admin_list_active_devices),
        )
        .route(
            "/api/admin/devices/reload",
            post(handlers::admin_reload_devices),
        )
        .route(
            "/api/admin/devices/{device_id}",
            get(handlers::admin_get_device)
                .put(handlers::admin_update_device)
                .delete(handlers::admin_delete_device),
        )
        .route(
            "/api/admin/devices/{device_id}/activate",
            post(handlers::admin_activate_device),
        )
        // Admin: polling targets
        .route(
            "/api/admin/polling",
            get(handlers::admin_list_targets).post(handlers::admin_create_target),
        )
        .route(
            "/api/admin/polling/active",
            get(handlers::admin_list_active_targets),
        )
        .route(
            "/api/admin/polling/reload",
            post(handlers::admin_reload_targets),
        )
        .route(
            "/api/admin/polling/device/{device_id}",
            get(handlers::admin_list_targets_for_device),
        )
        .route(
            "/api/admin/polling/{target_id}",
            get(handlers::admin_get_target)
                .put(handlers::admin_update_target)
                .delete(handlers::admin_delete_target),
        )
        .route(
            "/api/admin/polling/{target_id}/activate",
            post(handlers::admin_activate_target),
        )
        // Admin: cache
        .route(
            "/api/admin/cache",
            get(handlers::inspect_cache).delete(handlers::clear_cache),
        )
        .route("/api/admin/cache/stats", get(handlers::cache_stats))
        .route(
            "/api/admin/cache/device/{device_id}",
            get(handlers::inspect_device_cache),
        )
        // Middleware and state
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serves the router until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = build_router(state);
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}
