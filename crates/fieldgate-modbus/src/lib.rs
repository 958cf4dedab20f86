// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-modbus
//!
//! The Modbus data plane: transports, gateway connections and the client
//! manager that multiplexes many logical devices over few physical links.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     ModbusManager                       │
//! │   device map (copy-on-write) · retry/timeout ladder     │
//! └─────────────────────────────────────────────────────────┘
//!                │ routes by (host, port)
//!                ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                       Gateway                           │
//! │   one per (host, port) · mutex-serialized · breaker     │
//! └─────────────────────────────────────────────────────────┘
//!                │ owns
//!                ▼
//! ┌───────────────────────┐  ┌───────────────────────┐
//! │  TokioModbusTransport │  │    AsciiTransport     │
//! │  (SOCKET / RTU over   │  │  (`:` hex LRC CR LF   │
//! │   TCP, tokio-modbus)  │  │   over TCP, in-crate) │
//! └───────────────────────┘  └───────────────────────┘
//! ```
//!
//! Serialization invariant: all traffic for one `(host, port)` flows through
//! one [`Gateway`], whose transport sits behind an async mutex — frames from
//! different devices on the same RS-485 bus can never interleave.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod ascii;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod tokio_transport;
pub mod transport;

pub use error::{ClientError, ClientResult};
pub use gateway::{Gateway, GatewayStatus};
pub use manager::ModbusManager;
pub use tokio_transport::TokioModbusTransport;
pub use transport::{ModbusTransport, Operation, TcpTransportFactory, TransportFactory};
