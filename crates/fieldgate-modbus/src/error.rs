// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport-level error type.
//!
//! [`ClientError`] is what the transports raise and the manager classifies:
//! everything except a Modbus exception is a transport condition and feeds
//! the retry ladder; an exception is a well-formed answer from the device
//! and is surfaced immediately.

use std::time::Duration;

use thiserror::Error;

/// Result alias over [`ClientError`].
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised by Modbus transports.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection could not be established.
    #[error("connect failed: {message}")]
    Connect {
        /// Failure detail.
        message: String,
    },

    /// An attempt exceeded its time budget.
    #[error("operation timed out after {elapsed:?}")]
    Timeout {
        /// The elapsed budget.
        elapsed: Duration,
    },

    /// The connection dropped or returned an I/O error mid-operation.
    #[error("transport I/O error: {message}")]
    Io {
        /// Failure detail.
        message: String,
    },

    /// A frame failed to parse (bad LRC, truncated response, wrong echo).
    #[error("malformed frame: {message}")]
    Frame {
        /// Failure detail.
        message: String,
    },

    /// No connection is open.
    #[error("not connected")]
    NotConnected,

    /// The device answered with a Modbus exception.
    #[error("modbus exception 0x{code:02X} for function 0x{function:02X}")]
    Exception {
        /// Function code of the rejected request.
        function: u8,
        /// Modbus exception code.
        code: u8,
    },
}

impl ClientError {
    /// Creates a connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Creates an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a malformed-frame error.
    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    /// Returns `true` if the manager's retry ladder applies.
    ///
    /// A Modbus exception is never retried: the transport worked and the
    /// device said no.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Exception { .. })
    }
}

/// Standard name of a Modbus exception code.
pub const fn exception_name(code: u8) -> &'static str {
    match code {
        0x01 => "IllegalFunction",
        0x02 => "IllegalDataAddress",
        0x03 => "IllegalDataValue",
        0x04 => "ServerDeviceFailure",
        0x05 => "Acknowledge",
        0x06 => "ServerDeviceBusy",
        0x08 => "MemoryParityError",
        0x0A => "GatewayPathUnavailable",
        0x0B => "GatewayTargetDeviceFailedToRespond",
        _ => "Unknown",
    }
}
