// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error taxonomy.
//!
//! Every layer of the middleware maps its failures into [`CoreError`]:
//! the transport raises protocol/transport conditions, the manager
//! classifies and retries, the HTTP layer turns kinds into status codes.
//! The variants mirror the externally visible error kinds:
//!
//! | Kind | HTTP |
//! |---|---|
//! | `Validation` | 400 |
//! | `NotFound` | 404 |
//! | `Conflict` | 409 |
//! | `Device` | 502 (with modbus exception code) |
//! | `Transport` | 504 for timeouts, 502 otherwise |
//! | `CircuitOpen` | 503 + Retry-After |
//! | `Dependency` | 503 |

use std::time::Duration;

use thiserror::Error;

/// Result alias over [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// TransportKind
// =============================================================================

/// Sub-classification of transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// An attempt or the request budget timed out.
    Timeout,
    /// The connection could not be established.
    Connect,
    /// The connection dropped or misbehaved mid-operation.
    Io,
}

impl TransportKind {
    /// Short name for logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Io => "io",
        }
    }
}

// =============================================================================
// CoreError
// =============================================================================

/// The error taxonomy shared by every fieldgate component.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input failed validation (range, enum, missing field).
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// A device or polling target does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Human-readable resource description.
        resource: String,
    },

    /// A uniqueness constraint was violated.
    #[error("{message}")]
    Conflict {
        /// Conflict description.
        message: String,
    },

    /// The device answered with a Modbus exception. Never retried.
    #[error("modbus exception 0x{exception:02X} ({message})")]
    Device {
        /// Modbus exception code reported by the device.
        exception: u8,
        /// Exception name or detail.
        message: String,
    },

    /// The transport failed after the retry budget was exhausted.
    #[error("transport error ({}): {message}", .kind.as_str())]
    Transport {
        /// Failure sub-classification.
        kind: TransportKind,
        /// Failure detail.
        message: String,
    },

    /// The gateway circuit breaker is open; no I/O was attempted.
    #[error("circuit open for gateway {gateway}, retry in {}s", .retry_after.as_secs())]
    CircuitOpen {
        /// Gateway the breaker guards, as `host:port`.
        gateway: String,
        /// Remaining cooldown.
        retry_after: Duration,
    },

    /// A required collaborator (database, broker) is unavailable.
    #[error("dependency unavailable: {message}")]
    Dependency {
        /// Failure detail.
        message: String,
    },
}

impl CoreError {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a device (Modbus exception) error.
    pub fn device(exception: u8, message: impl Into<String>) -> Self {
        Self::Device {
            exception,
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Creates a transport timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::transport(TransportKind::Timeout, message)
    }

    /// Creates a circuit-open error.
    pub fn circuit_open(gateway: impl Into<String>, retry_after: Duration) -> Self {
        Self::CircuitOpen {
            gateway: gateway.into(),
            retry_after,
        }
    }

    /// Creates a dependency error.
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency {
            message: message.into(),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Stable kind tag used in error bodies and structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Device { .. } => "device_error",
            Self::Transport { .. } => "transport_error",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Dependency { .. } => "dependency_error",
        }
    }

    /// HTTP status code this kind surfaces as.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Device { .. } => 502,
            Self::Transport { kind, .. } => match kind {
                TransportKind::Timeout => 504,
                TransportKind::Connect | TransportKind::Io => 502,
            },
            Self::CircuitOpen { .. } | Self::Dependency { .. } => 503,
        }
    }

    /// Numeric detail code, when the kind carries one (Modbus exception).
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Device { exception, .. } => Some(*exception as u16),
            _ => None,
        }
    }

    /// Returns `true` if the manager may retry the operation.
    ///
    /// Only transport failures are retryable; a Modbus exception is a
    /// well-formed answer from a reachable device.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================
