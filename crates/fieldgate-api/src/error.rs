// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP error mapping.
//!
//! [`ApiError`] wraps the core taxonomy and renders it as
//! `{"error": kind, "detail": text, "code": int?}` with the status code the
//! taxonomy prescribes. `CircuitOpen` additionally carries a `Retry-After`
//! header with the remaining cooldown.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use fieldgate_core::error::CoreError;
use fieldgate_store::StoreError;

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Handler error, rendered per the error taxonomy.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CoreError);

impl ApiError {
    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(CoreError::validation(field, message))
    }

    /// Creates a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self(CoreError::not_found(resource))
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self(CoreError::conflict(message))
    }

    /// The wrapped taxonomy error.
    pub fn core(&self) -> &CoreError {
        &self.0
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

/// Error body shape shared by every endpoint.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u16>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let core = &self.0;
        let status =
            StatusCode::from_u16(core.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::warn!(kind = core.kind(), error = %core, "request failed");
        } else {
            tracing::debug!(kind = core.kind(), error = %core, "request rejected");
        }

        let body = ErrorBody {
            error: core.kind(),
            detail: core.to_string(),
            code: core.code(),
        };

        let mut response = (status, Json(body)).into_response();

        if let CoreError::CircuitOpen { retry_after, .. } = core {
            // Round up so "retry in 0.4s" does not become "now".
            let seconds = retry_after.as_secs_f64().ceil().max(0.0) as u64;
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn validation_maps_to_400() {
        let response = ApiError::validation("count", "must be 1-125").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn circuit_open_sets_retry_after() {
        let err = ApiError(CoreError::circuit_open("h:5020", Duration::from_secs_f64(12.3)));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["Retry-After"], "13");
    }

    #[test]
    fn timeout_maps_to_504() {
        let response = ApiError(CoreError::timeout("budget exceeded")).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn store_error_maps_to_503() {
        let err: ApiError = StoreError::invalid_row("bad").into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
