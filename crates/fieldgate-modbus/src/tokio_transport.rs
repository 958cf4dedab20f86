// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! SOCKET and RTU-over-TCP transports on tokio-modbus.
//!
//! Both framers ride the same TCP stream; the difference is only how
//! tokio-modbus frames the PDU (`tcp::attach_slave` builds MBAP headers,
//! `rtu::attach_slave` builds CRC-16 RTU frames — the serial-to-Ethernet
//! gateways this middleware targets expect the latter). One context carries
//! requests for every slave behind the gateway; the unit id is switched per
//! call via `set_slave`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_modbus::client::{Context as ModbusContext, Reader, Writer};
use tokio_modbus::prelude::*;
use tokio_modbus::{Error as TokioModbusError, ExceptionCode};

use fieldgate_core::types::{Framer, GatewayKey, RegisterType};

use crate::error::{ClientError, ClientResult};
use crate::transport::{ModbusTransport, Operation};

// =============================================================================
// TokioModbusTransport
// =============================================================================

/// tokio-modbus backed transport for the SOCKET and RTU framers.
pub struct TokioModbusTransport {
    key: GatewayKey,
    framer: Framer,
    connect_timeout: Duration,
    ctx: Option<ModbusContext>,
}

impl TokioModbusTransport {
    /// Creates a disconnected transport.
    ///
    /// `framer` must be [`Framer::Socket`] or [`Framer::Rtu`]; the ASCII
    /// framer has its own transport.
    pub fn new(key: GatewayKey, framer: Framer, connect_timeout: Duration) -> Self {
        debug_assert!(framer != Framer::Ascii);
        Self {
            key,
            framer,
            connect_timeout,
            ctx: None,
        }
    }

    async fn resolve_address(key: &GatewayKey) -> ClientResult<SocketAddr> {
        let addr_str = key.to_string();

        if let Ok(addr) = addr_str.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let mut addrs = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| ClientError::connect(format!("DNS lookup for {addr_str} failed: {e}")))?;

        addrs
            .next()
            .ok_or_else(|| ClientError::connect(format!("no address found for {addr_str}")))
    }

    fn exception_code_to_u8(code: &ExceptionCode) -> u8 {
        match code {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::ServerDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::ServerDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetDevice => 0x0B,
            _ => 0xFF,
        }
    }

    fn map_exception(function: u8, code: ExceptionCode) -> ClientError {
        ClientError::Exception {
            function,
            code: Self::exception_code_to_u8(&code),
        }
    }
}

#[async_trait]
impl ModbusTransport for TokioModbusTransport {
    async fn connect(&mut self) -> ClientResult<()> {
        if self.ctx.is_some() {
            return Ok(());
        }

        let addr = Self::resolve_address(&self.key).await?;

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                ClientError::connect(format!(
                    "connect to {} timed out after {:?}",
                    self.key, self.connect_timeout
                ))
            })?
            .map_err(|e| ClientError::connect(format!("connect to {} failed: {e}", self.key)))?;

        stream.set_nodelay(true).ok();

        // The unit id is set per request; slave 0 is a placeholder.
        let ctx = match self.framer {
            Framer::Socket => tcp::attach_slave(stream, Slave(0)),
            Framer::Rtu => rtu::attach_slave(stream, Slave(0)),
            Framer::Ascii => unreachable!("ASCII uses AsciiTransport"),
        };

        self.ctx = Some(ctx);

        tracing::info!(
            gateway = %self.key,
            framer = %self.framer,
            "connected to modbus gateway"
        );

        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                tracing::debug!(gateway = %self.key, error = %e, "error during disconnect");
            }
            tracing::debug!(gateway = %self.key, "disconnected from modbus gateway");
        }
    }

    fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    async fn execute(&mut self, slave_id: u8, operation: Operation) -> ClientResult<Vec<u16>> {
        let key = self.key.clone();
        let ctx = self.ctx.as_mut().ok_or(ClientError::NotConnected)?;
        ctx.set_slave(Slave(slave_id));

        let map_err = |error: TokioModbusError| match error {
            TokioModbusError::Transport(io_error) => {
                use std::io::ErrorKind;
                match io_error.kind() {
                    ErrorKind::ConnectionRefused => {
                        ClientError::connect(format!("{key} refused the connection"))
                    }
                    ErrorKind::NotConnected => ClientError::NotConnected,
                    _ => ClientError::io(io_error.to_string()),
                }
            }
            TokioModbusError::Protocol(protocol_error) => {
                ClientError::frame(format!("{protocol_error:?}"))
            }
        };

        match operation {
            Operation::Read {
                register_type,
                address,
                count,
            } => {
                let function = register_type.read_function_code();
                match register_type {
                    RegisterType::Holding => ctx
                        .read_holding_registers(address, count)
                        .await
                        .map_err(map_err)?
                        .map_err(|code| Self::map_exception(function, code)),
                    RegisterType::Input => ctx
                        .read_input_registers(address, count)
                        .await
                        .map_err(map_err)?
                        .map_err(|code| Self::map_exception(function, code)),
                    RegisterType::Coil => ctx
                        .read_coils(address, count)
                        .await
                        .map_err(map_err)?
                        .map_err(|code| Self::map_exception(function, code))
                        .map(bits_to_words),
                    RegisterType::Discrete => ctx
                        .read_discrete_inputs(address, count)
                        .await
                        .map_err(map_err)?
                        .map_err(|code| Self::map_exception(function, code))
                        .map(bits_to_words),
                }
            }
            Operation::Write {
                register_type,
                address,
                value,
            } => {
                let function = register_type
                    .write_function_code()
                    .ok_or_else(|| ClientError::frame(format!("{register_type} is read-only")))?;
                match register_type {
                    RegisterType::Holding => ctx
                        .write_single_register(address, value)
                        .await
                        .map_err(map_err)?
                        .map_err(|code| Self::map_exception(function, code))?,
                    RegisterType::Coil => ctx
                        .write_single_coil(address, value != 0)
                        .await
                        .map_err(map_err)?
                        .map_err(|code| Self::map_exception(function, code))?,
                    _ => unreachable!("write_function_code filtered read-only spaces"),
                }
                Ok(Vec::new())
            }
        }
    }

    fn describe(&self) -> String {
        match self.framer {
            Framer::Socket => format!("modbus tcp {}", self.key),
            Framer::Rtu => format!("modbus rtu-over-tcp {}", self.key),
            Framer::Ascii => unreachable!(),
        }
    }
}

fn bits_to_words(bits: Vec<bool>) -> Vec<u16> {
    bits.into_iter().map(u16::from).collect()
}

impl std::fmt::Debug for TokioModbusTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioModbusTransport")
            .field("gateway", &self.key.to_string())
            .field("framer", &self.framer)
            .field("connected", &self.is_connected())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let transport = TokioModbusTransport::new(
            GatewayKey::new("127.0.0.1", 5020),
            Framer::Socket,
            Duration::from_secs(1),
        );
        assert!(!transport.is_connected());
        assert_eq!(transport.describe(), "modbus tcp 127.0.0.1:5020");
    }

    #[tokio::test]
    async fn execute_without_connection_fails() {
        let mut transport = TokioModbusTransport::new(
            GatewayKey::new("127.0.0.1", 5020),
            Framer::Rtu,
            Duration::from_secs(1),
        );
        let result = transport
            .execute(
                1,
                Operation::Read {
                    register_type: RegisterType::Holding,
                    address: 0,
                    count: 1,
                },
            )
            .await;
        assert!(matches!(result, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        let mut transport = TokioModbusTransport::new(
            // TEST-NET-1, guaranteed unroutable.
            GatewayKey::new("192.0.2.1", 502),
            Framer::Socket,
            Duration::from_millis(50),
        );
        let result = transport.connect().await;
        assert!(matches!(result, Err(ClientError::Connect { .. })));
        assert!(!transport.is_connected());
    }

    #[test]
    fn exception_code_mapping() {
        assert_eq!(
            TokioModbusTransport::exception_code_to_u8(&ExceptionCode::IllegalDataAddress),
            0x02
        );
        assert_eq!(
            TokioModbusTransport::exception_code_to_u8(&ExceptionCode::ServerDeviceBusy),
            0x06
        );
    }

    #[test]
    fn bits_become_words() {
        assert_eq!(bits_to_words(vec![true, false, true]), vec![1, 0, 1]);
    }
}
