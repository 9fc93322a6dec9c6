//! Error taxonomy for the bookshelf HTTP layer
//!
//! Every failure a handler can report is an [`AppError`]. Each variant belongs
//! to one [`ErrorKind`], which fixes the stable machine-readable code, and
//! renders a fixed human-readable message. Driver and decoder errors are kept
//! for logging only and never reach the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MSG_INVALID_ID: &str = "invalid url param-id";
pub const MSG_DECODE_FAILURE: &str = "json decode failure";
pub const MSG_NOT_FOUND: &str = "no data found";
pub const MSG_ACCESS_FAILURE: &str = "db data access failure";
pub const MSG_INTERNAL: &str = "an internal server error occurred";

/// Failure category, independent of the concrete cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailed,
    DecodeFailed,
    NotFound,
    StorageAccessFailed,
    StorageWriteFailed,
    Internal,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::DecodeFailed => "decode_failed",
            Self::NotFound => "not_found",
            Self::StorageAccessFailed => "storage_access_failed",
            Self::StorageWriteFailed => "storage_write_failed",
            Self::Internal => "internal_error",
        }
    }
}

/// Storage write operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
    Remove,
}

impl WriteOp {
    pub const fn message(self) -> &'static str {
        match self {
            Self::Insert => "db data insert failure",
            Self::Update => "db data update failure",
            Self::Remove => "db data remove failure",
        }
    }
}

/// Single-message error body: `{"error": "..."}` plus envelope fields.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub trace_id: String,
    pub timestamp: String,
}

/// Multi-violation error body: `{"errors": [...]}` plus envelope fields.
#[derive(Debug, Serialize)]
pub struct ErrorsBody {
    pub errors: Vec<String>,
    pub code: &'static str,
    pub trace_id: String,
    pub timestamp: String,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    /// Request body violated one or more field constraints.
    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    /// A path parameter did not have the expected syntax.
    #[error("invalid path parameter '{value}'")]
    InvalidParam { value: String },

    #[error("malformed request body")]
    Decode(#[source] serde_json::Error),

    #[error("no data found")]
    NotFound,

    #[error("storage access failed")]
    StorageAccess(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("storage write failed: {}", .op.message())]
    StorageWrite {
        op: WriteOp,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error carrying one message per violation
    pub fn validation(errors: Vec<String>) -> Self {
        Self::Validation { errors }
    }

    pub fn invalid_param(value: impl Into<String>) -> Self {
        Self::InvalidParam {
            value: value.into(),
        }
    }

    pub fn storage_access(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::StorageAccess(Box::new(source))
    }

    pub fn storage_write(
        op: WriteOp,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StorageWrite {
            op,
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidParam { .. } => ErrorKind::ValidationFailed,
            Self::Decode(_) => ErrorKind::DecodeFailed,
            Self::NotFound => ErrorKind::NotFound,
            Self::StorageAccess(_) => ErrorKind::StorageAccessFailed,
            Self::StorageWrite { .. } => ErrorKind::StorageWriteFailed,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidParam { .. } | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::StorageAccess(_) | Self::StorageWrite { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The stable client-facing message for single-message errors.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation failed",
            Self::InvalidParam { .. } => MSG_INVALID_ID,
            Self::Decode(_) => MSG_DECODE_FAILURE,
            Self::NotFound => MSG_NOT_FOUND,
            Self::StorageAccess(_) => MSG_ACCESS_FAILURE,
            Self::StorageWrite { op, .. } => op.message(),
            Self::Internal(_) => MSG_INTERNAL,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let trace_id = Uuid::new_v4().to_string();
        let timestamp = OffsetDateTime::now_utc().to_string();
        let kind = self.kind();
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                trace_id = %trace_id,
                error_code = kind.code(),
                status_code = status.as_u16(),
                error = ?self,
                "request failed"
            );
        } else {
            tracing::warn!(
                trace_id = %trace_id,
                error_code = kind.code(),
                status_code = status.as_u16(),
                error = %self,
                "request rejected"
            );
        }

        match self {
            AppError::Validation { errors } => (
                status,
                Json(ErrorsBody {
                    errors,
                    code: kind.code(),
                    trace_id,
                    timestamp,
                }),
            )
                .into_response(),
            other => (
                status,
                Json(ErrorBody {
                    error: other.public_message().to_string(),
                    code: kind.code(),
                    trace_id,
                    timestamp,
                }),
            )
                .into_response(),
        }
    }
}
