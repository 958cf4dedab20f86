// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-mqtt
//!
//! Fire-and-forget publisher for polled register samples.
//!
//! The publisher never blocks or fails the polling path: publish errors are
//! logged and counted, nothing more. When no broker is configured the
//! publisher is a no-op. A background driver task keeps the rumqttc event
//! loop turning and reconnects with exponential backoff.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod publisher;

pub use publisher::{MqttPublisher, MqttSettings, Sample};
