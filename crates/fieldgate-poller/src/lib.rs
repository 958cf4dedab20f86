// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-poller
//!
//! The background polling scheduler. Each tick it reloads the active
//! target set from the database (no reload call needed), fans reads out
//! per gateway (sequential within a gateway, concurrent across gateways),
//! writes results into the register cache and hands them to MQTT.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod service;

pub use service::Poller;
