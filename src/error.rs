//! Application error type and its HTTP mapping.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;
use crate::memory::MemoryError;

/// Error codes carried in error payloads, over REST and WebSocket alike.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const MEMORY_ERROR: &str = "MEMORY_ERROR";
    pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
    pub const INVALID_MESSAGE_TYPE: &str = "INVALID_MESSAGE_TYPE";
    pub const SESSION_BUSY: &str = "SESSION_BUSY";
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Language model error: {0}")]
    Upstream(#[from] LlmError),

    #[error("Session memory error: {0}")]
    Memory(#[from] MemoryError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Memory(_) => codes::MEMORY_ERROR,
        }
    }

    /// Message safe to hand to a client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Memory(_) => "Session storage is unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Memory(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.public_message(),
            code: self.code(),
        })
    }
}
