//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service and how it is reported
//! to HTTP callers.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use invoice_core::{PortError, TransitionError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No verified identity accompanied the request.
    #[error("Authentication required")]
    Unauthenticated,

    /// The resource is absent or belongs to another user.
    #[error("{0}")]
    NotFound(String),

    /// A status change was refused by the business rules.
    #[error("{0}")]
    InvalidTransition(String),

    /// The request body or query was malformed.
    #[error("{0}")]
    Validation(String),

    /// Persistence failed for reasons unrelated to business rules.
    #[error("Dependency failure: {0}")]
    Dependency(String),

    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidTransition(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidTransition(_) => "INVALID_TRANSITION",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Dependency(_) | ApiError::Database(_) => "DEPENDENCY_FAILURE",
            _ => "INTERNAL_ERROR",
        }
    }
}

impl From<PortError> for ApiError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => ApiError::NotFound(what),
            PortError::Unauthorized => ApiError::Unauthenticated,
            PortError::Unexpected(reason) => ApiError::Dependency(reason),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::NotFound => ApiError::NotFound("Invoice not found".to_string()),
            TransitionError::TerminalState(_) | TransitionError::RevertToDraft(_) => {
                ApiError::InvalidTransition(e.to_string())
            }
            TransitionError::Dependency(source) => ApiError::Dependency(source.to_string()),
        }
    }
}

//=========================================================================================
// Response Envelope
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// The body of every failed request.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs.
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code: self.code().to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
