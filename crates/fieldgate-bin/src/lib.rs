// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-bin
//!
//! Process assembly for the `fieldgate` binary: CLI parsing, environment
//! configuration, tracing setup, runtime bootstrap and graceful shutdown.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use config::Settings;
pub use error::BinError;
