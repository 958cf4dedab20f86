// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Abstract transport layer.
//!
//! A [`ModbusTransport`] is one wire connection to a gateway that can carry
//! requests for any slave behind it. Transports are constructed through a
//! [`TransportFactory`] so the manager never names a concrete transport
//! type — the test harness swaps in a scripted mock the same way.

use std::time::Duration;

use async_trait::async_trait;

use fieldgate_core::types::{Framer, GatewayKey, RegisterType};

use crate::ascii::AsciiTransport;
use crate::error::ClientResult;
use crate::tokio_transport::TokioModbusTransport;

// =============================================================================
// Operation
// =============================================================================

/// One Modbus request, independent of the wire framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read `count` items from a register space.
    Read {
        /// Register space.
        register_type: RegisterType,
        /// Start address.
        address: u16,
        /// Number of items.
        count: u16,
    },
    /// Write one item to a writable register space.
    Write {
        /// Register space (`holding` or `coil`).
        register_type: RegisterType,
        /// Item address.
        address: u16,
        /// Value; coils treat any non-zero value as ON.
        value: u16,
    },
}

impl Operation {
    /// The register space this operation touches.
    pub const fn register_type(&self) -> RegisterType {
        match self {
            Self::Read { register_type, .. } | Self::Write { register_type, .. } => *register_type,
        }
    }
}

// =============================================================================
// ModbusTransport
// =============================================================================

/// One wire connection to a `(host, port)` gateway.
///
/// Implementations are driven under the gateway mutex: calls always have
/// exclusive access, hence `&mut self` throughout. Attempt-level timeouts
/// are enforced by the caller, not by the transport.
#[async_trait]
pub trait ModbusTransport: Send {
    /// Opens the connection. Idempotent when already connected.
    async fn connect(&mut self) -> ClientResult<()>;

    /// Closes the connection. Never fails; a broken socket is simply dropped.
    async fn disconnect(&mut self);

    /// Returns `true` while a connection is open.
    fn is_connected(&self) -> bool;

    /// Executes one request against `slave_id`.
    ///
    /// Reads return one `u16` per item (bit spaces as 0/1). Writes return
    /// an empty vector.
    async fn execute(&mut self, slave_id: u8, operation: Operation) -> ClientResult<Vec<u16>>;

    /// Human-readable description for logs.
    fn describe(&self) -> String;
}

// =============================================================================
// TransportFactory
// =============================================================================

/// Builds transports for gateway keys.
pub trait TransportFactory: Send + Sync {
    /// Creates a disconnected transport for `key` using `framer`.
    ///
    /// `connect_timeout` bounds connection establishment; it is taken from
    /// the first device that opens the gateway.
    fn create(
        &self,
        key: &GatewayKey,
        framer: Framer,
        connect_timeout: Duration,
    ) -> Box<dyn ModbusTransport>;
}

/// Production factory: tokio-modbus for SOCKET and RTU-over-TCP, the
/// in-crate ASCII codec for ASCII.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpTransportFactory;

impl TransportFactory for TcpTransportFactory {
    fn create(
        &self,
        key: &GatewayKey,
        framer: Framer,
        connect_timeout: Duration,
    ) -> Box<dyn ModbusTransport> {
        match framer {
            Framer::Socket | Framer::Rtu => Box::new(TokioModbusTransport::new(
                key.clone(),
                framer,
                connect_timeout,
            )),
            Framer::Ascii => Box::new(AsciiTransport::new(key.clone(), connect_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_transport_by_framer() {
        let factory = TcpTransportFactory;
        let key = GatewayKey::new("127.0.0.1", 5020);

        let socket = factory.create(&key, Framer::Socket, Duration::from_secs(1));
        assert!(socket.describe().contains("tcp"));

        let rtu = factory.create(&key, Framer::Rtu, Duration::from_secs(1));
        assert!(rtu.describe().contains("rtu"));

        let ascii = factory.create(&key, Framer::Ascii, Duration::from_secs(1));
        assert!(ascii.describe().contains("ascii"));
    }

    #[test]
    fn operation_register_type() {
        let read = Operation::Read {
            register_type: RegisterType::Input,
            address: 0,
            count: 2,
        };
        assert_eq!(read.register_type(), RegisterType::Input);

        let write = Operation::Write {
            register_type: RegisterType::Coil,
            address: 3,
            value: 1,
        };
        assert_eq!(write.register_type(), RegisterType::Coil);
    }
}
