//! Error handling for the Potluck API
//!
//! This module provides the error types used across the service:
//! - [`PartyError`] for the watch-party engine
//! - [`ApiError`] for HTTP handlers, with automatic status code mapping via
//!   Axum's IntoResponse trait

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised inside the watch-party engine
///
/// Only `SessionNotFound` is ever surfaced to a caller. The others are
/// logged where they happen and the offending event is dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartyError {
    /// Join attempted against an unknown or expired code
    #[error("watch party not found: {0}")]
    SessionNotFound(String),

    /// A non-host issued a host-only command
    #[error("only the host can {0}")]
    UnauthorizedCommand(&'static str),

    /// Event payload could not be applied
    #[error("malformed event: {0}")]
    MalformedEvent(String),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

/// Main API error type
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested resource not found
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Invalid query parameter
    #[error("invalid query parameter '{name}': {reason}")]
    InvalidQueryParam { name: &'static str, reason: String },
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidQueryParam { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code string for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidQueryParam { .. } => "INVALID_QUERY_PARAM",
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!(
            error = %self,
            code = self.error_code(),
            status = status.as_u16(),
            "Client error"
        );

        let error_response = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
