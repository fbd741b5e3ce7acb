//! Error types for Switchyard
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Machine-readable error codes
//! - Collaborator classification for stage error handling

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,

    // Collaborator errors (8xxx)
    CollaboratorUnavailable,
    CollaboratorTimeout,
    UpstreamError,

    // Workflow errors (9xxx)
    StageFailure,
    InvariantViolation,
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Input (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,

            // Collaborators (8xxx)
            ErrorCode::CollaboratorUnavailable => 8001,
            ErrorCode::CollaboratorTimeout => 8002,
            ErrorCode::UpstreamError => 8003,

            // Workflow (9xxx)
            ErrorCode::StageFailure => 9001,
            ErrorCode::InvariantViolation => 9002,
            ErrorCode::InternalError => 9003,
            ErrorCode::ConfigurationError => 9004,
            ErrorCode::SerializationError => 9005,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Collaborator errors
    #[error("Collaborator unavailable: {collaborator} is not initialized")]
    CollaboratorUnavailable { collaborator: String },

    #[error("Collaborator {collaborator} timed out after {timeout_ms}ms")]
    CollaboratorTimeout { collaborator: String, timeout_ms: u64 },

    #[error("{collaborator} error: {message}")]
    Upstream { collaborator: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Workflow errors
    #[error("{stage} stage failed: {message}")]
    StageFailure { stage: String, message: String },

    #[error("Workflow invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::CollaboratorUnavailable { .. } => ErrorCode::CollaboratorUnavailable,
            AppError::CollaboratorTimeout { .. } => ErrorCode::CollaboratorTimeout,
            AppError::Upstream { .. } | AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::StageFailure { .. } => ErrorCode::StageFailure,
            AppError::InvariantViolation { .. } => ErrorCode::InvariantViolation,
            AppError::Internal { .. } | AppError::Other(_) => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Whether the error came from a collaborator (retrieval, tabular,
    /// numeric or generation backend) rather than from the engine itself
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::CollaboratorUnavailable
                | ErrorCode::CollaboratorTimeout
                | ErrorCode::UpstreamError
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}
