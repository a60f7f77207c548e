//! Error handling module for the roster backend.
//!
//! Every domain outcome maps to a stable error code so automated callers can
//! branch on it without string matching.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::TeamDeactivateResult;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const TEAM_EXISTS: &str = "TEAM_EXISTS";
    pub const PR_EXISTS: &str = "PR_EXISTS";
    pub const PR_MERGED: &str = "PR_MERGED";
    pub const NOT_ASSIGNED: &str = "NOT_ASSIGNED";
    pub const NO_CANDIDATE: &str = "NO_CANDIDATE";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Team, user or pull request does not exist
    NotFound(String),
    /// Team name already taken
    TeamExists(String),
    /// Pull request id already taken
    PrExists(String),
    /// Mutation attempted on a merged pull request
    PrMerged(String),
    /// Named user is not a reviewer of the pull request
    NotAssigned(String),
    /// No eligible replacement reviewer
    NoCandidate(String),
    /// Team deactivation committed, but some reviewer slots stayed vacant
    IncompleteDeactivation(TeamDeactivateResult),
    /// Validation error
    Validation(String),
    /// Optimistic concurrency conflict
    Conflict {
        message: String,
        current_version: i64,
    },
    /// Operation exceeded its deadline
    Timeout(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TeamExists(_) => StatusCode::BAD_REQUEST,
            AppError::PrExists(_) => StatusCode::CONFLICT,
            AppError::PrMerged(_) => StatusCode::CONFLICT,
            AppError::NotAssigned(_) => StatusCode::CONFLICT,
            AppError::NoCandidate(_) => StatusCode::CONFLICT,
            AppError::IncompleteDeactivation(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::TeamExists(_) => codes::TEAM_EXISTS,
            AppError::PrExists(_) => codes::PR_EXISTS,
            AppError::PrMerged(_) => codes::PR_MERGED,
            AppError::NotAssigned(_) => codes::NOT_ASSIGNED,
            AppError::NoCandidate(_) => codes::NO_CANDIDATE,
            AppError::IncompleteDeactivation(_) => codes::NO_CANDIDATE,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict { .. } => codes::VERSION_MISMATCH,
            AppError::Timeout(_) => codes::TIMEOUT,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::TeamExists(msg)
            | AppError::PrExists(msg)
            | AppError::PrMerged(msg)
            | AppError::NotAssigned(msg)
            | AppError::NoCandidate(msg)
            | AppError::Validation(msg)
            | AppError::Timeout(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg) => msg.clone(),
            AppError::IncompleteDeactivation(result) => format!(
                "unable to reassign all reviewers: {} pull request(s) left with vacant slots",
                result.skipped_prs
            ),
            AppError::Conflict { message, .. } => message.clone(),
        }
    }

    /// Structured payload attached to the error envelope, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Conflict {
                current_version, ..
            } => Some(serde_json::json!({ "current_version": current_version })),
            AppError::IncompleteDeactivation(result) => serde_json::to_value(result).ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        tracing::warn!("Operation deadline exceeded");
        AppError::Timeout("operation deadline exceeded".to_string())
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details: error.details(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
