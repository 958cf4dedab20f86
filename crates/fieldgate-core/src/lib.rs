// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-core
//!
//! Core abstractions shared across the fieldgate Modbus middleware:
//!
//! - **Types**: `DeviceId`, `GatewayKey`, `RegisterType`, `Framer`,
//!   `DeviceConfig`, `PollingTarget`
//! - **Error**: the unified error taxonomy every layer maps into
//! - **CircuitBreaker**: per-gateway fault isolation with lock-free state
//! - **Cache**: TTL register cache with observable stats
//! - **Metrics**: process-wide counters with snapshot-on-demand

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod metrics;
pub mod types;

pub use cache::{CacheEntry, CacheStats, RegisterCache};
pub use circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{CoreError, CoreResult, TransportKind};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use types::{DeviceConfig, DeviceId, Framer, GatewayKey, PollingTarget, RegisterType};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
