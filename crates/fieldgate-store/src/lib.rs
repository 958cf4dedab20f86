// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldgate-store
//!
//! Persistence for device and polling-target configuration.
//!
//! Two tables, soft-delete semantics (`DELETE` flips `is_active`, rows stay
//! for audit), and application-level foreign-key validation. Storage is
//! abstracted behind the [`DeviceStore`] and [`PollingStore`] traits with a
//! Postgres implementation for production and an in-memory one for tests
//! and development.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use models::{
    DeviceCreate, DeviceRecord, DeviceUpdate, PollingTargetCreate, PollingTargetRecord,
    PollingTargetUpdate,
};
pub use postgres::PgStore;
pub use traits::{DeviceStore, PollingStore};
