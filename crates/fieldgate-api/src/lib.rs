// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-api
//!
//! The HTTP surface of the middleware: axum handlers over the shared
//! [`AppState`], with the request pipeline (validation, live/cache source
//! selection, wall-clock budget, write path) between the handlers and the
//! Modbus manager.
//!
//! All responses are JSON. Error bodies carry the taxonomy kind:
//! `{"error": "<kind>", "detail": "<text>", "code": <int?>}`.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::build_router;
pub use state::AppState;
