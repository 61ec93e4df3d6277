//! Error types for playlist-export
//!
//! This module provides error handling for the library, including:
//! - The crate-wide [`Error`] enum used by the job manager, fetcher and API
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Transient rate limiting and lazy timeouts are never errors here: they are
//! absorbed by the job runner and surfaced as job state instead.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::JobId;

/// Result type alias for playlist-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playlist-export
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "work_dir")
        key: Option<String>,
    },

    /// A live job already exists under this id
    #[error("job {id} already exists with status {status}")]
    Conflict {
        /// The conflicting job id
        id: JobId,
        /// Status of the existing job
        status: String,
    },

    /// Job id is unknown
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// Archive requested before the job reached a terminal state
    #[error("job {0} is still in progress")]
    NotReady(JobId),

    /// Archive requested for a job that failed
    #[error("{message}")]
    JobFailed {
        /// The failed job id
        id: JobId,
        /// The error recorded on the job
        message: String,
    },

    /// The job's work directory disappeared before the archive could be built
    #[error("files for job {id} are no longer available at {path}")]
    FilesMissing {
        /// The job id whose files are gone
        id: JobId,
        /// The directory that was expected to exist
        path: PathBuf,
    },

    /// Rejected job identifier
    #[error("invalid job id {id:?}: {reason}")]
    InvalidJobId {
        /// The raw identifier that was rejected
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Malformed request input
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or expired access token
    #[error("{0}")]
    Unauthorized(String),

    /// External tool could not be located or launched
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive writing failed
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Network error talking to the playlist source
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The playlist source answered with a non-success status
    #[error("playlist source returned {status}: {message}")]
    Upstream {
        /// HTTP status returned by the upstream API
        status: u16,
        /// Body or reason returned by the upstream API
        message: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_ready",
///     "message": "job 37i9dQZF1DXcBWIGoYBM5M is still in progress",
///     "details": {
///       "job_id": "37i9dQZF1DXcBWIGoYBM5M"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "conflict")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::InvalidJobId { .. } => 400,
            Error::NotReady(_) => 400,
            Error::Validation(_) => 400,

            // 401 Unauthorized
            Error::Unauthorized(_) => 401,

            // 404 Not Found
            Error::JobNotFound(_) => 404,

            // 409 Conflict
            Error::Conflict { .. } => 409,

            // 500 Internal Server Error - the job itself failed, or local issues
            Error::JobFailed { .. } => 500,
            Error::FilesMissing { .. } => 500,
            Error::Io(_) => 500,
            Error::Archive(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - upstream playlist source
            Error::Network(_) => 502,
            Error::Upstream { .. } => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Conflict { .. } => "conflict",
            Error::JobNotFound(_) => "job_not_found",
            Error::NotReady(_) => "not_ready",
            Error::JobFailed { .. } => "job_failed",
            Error::FilesMissing { .. } => "files_missing",
            Error::InvalidJobId { .. } => "invalid_job_id",
            Error::Validation(_) => "validation_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Io(_) => "io_error",
            Error::Archive(_) => "archive_error",
            Error::Network(_) => "network_error",
            Error::Upstream { .. } => "upstream_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Conflict { id, status } => Some(serde_json::json!({
                "job_id": id,
                "status": status,
            })),
            Error::JobNotFound(id) | Error::NotReady(id) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::JobFailed { id, .. } => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::FilesMissing { id, path } => Some(serde_json::json!({
                "job_id": id,
                "path": path,
            })),
            Error::Upstream { status, .. } => Some(serde_json::json!({
                "upstream_status": status,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
