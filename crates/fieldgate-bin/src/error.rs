// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Binary-level errors.

use thiserror::Error;

/// Fatal errors during startup or serving.
#[derive(Debug, Error)]
pub enum BinError {
    /// Environment configuration was invalid.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Database startup failed.
    #[error("storage error: {0}")]
    Store(#[from] fieldgate_store::StoreError),

    /// Binding or serving the HTTP listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
