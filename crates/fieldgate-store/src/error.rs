// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Storage error type.

use fieldgate_core::error::CoreError;
use thiserror::Error;

/// Result alias over [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected or failed the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row held a value the domain types reject (bad framer, range).
    #[error("invalid row: {message}")]
    InvalidRow {
        /// What was wrong.
        message: String,
    },
}

impl StoreError {
    /// Creates an invalid-row error.
    pub fn invalid_row(message: impl Into<String>) -> Self {
        Self::InvalidRow {
            message: message.into(),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::dependency(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_dependency_error() {
        let err: CoreError = StoreError::invalid_row("bad framer").into();
        assert_eq!(err.kind(), "dependency_error");
        assert_eq!(err.status_code(), 503);
    }
}
