// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway: one physical transport per `(host, port)`.
//!
//! A [`Gateway`] owns the transport behind an async mutex and a circuit
//! breaker. The mutex is the serialization invariant: many logical devices
//! share one RS-485 bus behind the gateway, and concurrent frames would
//! collide, so at most one read or write is ever in flight per gateway.
//!
//! The manager acquires the transport guard for the whole duration of a
//! call (retries included) and reports the outcome to the breaker.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use fieldgate_core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use fieldgate_core::types::GatewayKey;

use crate::transport::ModbusTransport;

// =============================================================================
// Gateway
// =============================================================================

/// One physical gateway connection with breaker and serialization lock.
pub struct Gateway {
    key: GatewayKey,
    transport: Mutex<Box<dyn ModbusTransport>>,
    breaker: CircuitBreaker,
    /// Mirror of the transport's connection state, readable without the lock
    /// for status surfaces.
    connected: AtomicBool,
}

impl Gateway {
    /// Creates a gateway around a (disconnected) transport.
    pub fn new(
        key: GatewayKey,
        transport: Box<dyn ModbusTransport>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            key,
            transport: Mutex::new(transport),
            breaker: CircuitBreaker::new(breaker_config),
            connected: AtomicBool::new(false),
        }
    }

    /// The gateway's key.
    pub fn key(&self) -> &GatewayKey {
        &self.key
    }

    /// The gateway's circuit breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Acquires exclusive access to the transport.
    ///
    /// Lock acquisition order is the total order of operations on this
    /// gateway.
    pub async fn lock_transport(&self) -> MutexGuard<'_, Box<dyn ModbusTransport>> {
        self.transport.lock().await
    }

    /// Updates the lock-free connection mirror. Called by the manager while
    /// it holds the transport guard.
    pub fn mark_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Returns `true` while the transport is believed connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Closes the current connection; the next operation reopens it.
    pub async fn reset(&self) {
        let mut transport = self.transport.lock().await;
        transport.disconnect().await;
        self.connected.store(false, Ordering::Relaxed);
        tracing::debug!(gateway = %self.key, "gateway connection reset");
    }

    /// Idempotent teardown.
    pub async fn close(&self) {
        let mut transport = self.transport.lock().await;
        transport.disconnect().await;
        self.connected.store(false, Ordering::Relaxed);
    }

    /// Status snapshot for the API.
    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            host: self.key.host.clone(),
            port: self.key.port,
            connected: self.is_connected(),
            circuit_state: self.breaker.state(),
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("key", &self.key.to_string())
            .field("connected", &self.is_connected())
            .field("circuit_state", &self.breaker.state())
            .finish()
    }
}

// =============================================================================
// GatewayStatus
// =============================================================================

/// Serializable gateway status row.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Whether a connection is currently open.
    pub connected: bool,
    /// Circuit breaker phase.
    pub circuit_state: CircuitState,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientResult;
    use crate::transport::Operation;
    use async_trait::async_trait;

    struct NullTransport {
        connected: bool,
    }

    #[async_trait]
    impl ModbusTransport for NullTransport {
        async fn connect(&mut self) -> ClientResult<()> {
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn execute(&mut self, _slave_id: u8, _operation: Operation) -> ClientResult<Vec<u16>> {
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "null".to_string()
        }
    }

    fn gateway() -> Gateway {
        Gateway::new(
            GatewayKey::new("10.0.0.5", 5020),
            Box::new(NullTransport { connected: false }),
            CircuitBreakerConfig::default(),
        )
    }

    #[tokio::test]
    async fn status_reflects_connection_mirror() {
        let gw = gateway();
        let status = gw.status();
        assert!(!status.connected);
        assert_eq!(status.circuit_state, CircuitState::Closed);
        assert_eq!(status.host, "10.0.0.5");
        assert_eq!(status.port, 5020);

        gw.mark_connected(true);
        assert!(gw.status().connected);
    }

    #[tokio::test]
    async fn reset_disconnects_and_clears_mirror() {
        let gw = gateway();
        {
            let mut transport = gw.lock_transport().await;
            transport.connect().await.unwrap();
        }
        gw.mark_connected(true);

        gw.reset().await;
        assert!(!gw.is_connected());
        assert!(!gw.lock_transport().await.is_connected());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let gw = gateway();
        gw.close().await;
        gw.close().await;
        assert!(!gw.is_connected());
    }

    #[test]
    fn status_serializes_circuit_state_lowercase() {
        let gw = gateway();
        let json = serde_json::to_value(gw.status()).unwrap();
        assert_eq!(json["circuit_state"], "closed");
    }
}
