//! # Error Handling
//!
//! This module defines the HTTP-facing error type and how failures from the
//! interview core, the providers and storage are mapped onto it.
//!
//! ## Key Rust Concepts for Error Handling:
//!
//! ### Enums for Error Types
//! - **Variants**: Each enum variant is one kind of failure the API can report
//! - **Data**: `ReplyWithoutAudio` carries the reply text alongside the message
//!
//! ### Traits for Error Conversion
//! - **From trait**: Lets handlers use `?` on core, storage and IO results
//! - **ResponseError trait**: Converts errors to HTTP responses
//! - **Display trait**: Defines how errors are formatted as strings
//!
//! ## Error Response Body:
//! Every error is JSON with the same envelope:
//! ```json
//! {
//!   "error": {
//!     "type": "validation_error",
//!     "message": "Validation error: file name 'foo.txt' has no '_' between prefix and timestamp",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```
//! `reply_without_audio` errors add `"reply_text"` to the inner object.

use crate::interview::TurnError;
use crate::storage::StorageError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Error Categories:
/// - **Internal**: Filesystem or other server-side problems (500)
/// - **BadRequest**: Malformed request, e.g. a multipart body without a file (400)
/// - **NotFound**: Requested resource doesn't exist (404)
/// - **ValidationError**: Unusable input such as a bad transcript name (400)
/// - **Upstream**: The text generator or object storage failed (502)
/// - **ReplyWithoutAudio**: The reply text exists but its audio does not (502)
#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    ValidationError(String),

    /// A remote dependency failed before anything was produced
    Upstream(String),

    /// Text was generated and recorded, but synthesis or saving failed
    ReplyWithoutAudio { message: String, reply_text: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            AppError::ReplyWithoutAudio { message, .. } => write!(f, "Reply without audio: {}", message),
        }
    }
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::ValidationError(_) => "validation_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::ReplyWithoutAudio { .. } => "reply_without_audio",
        }
    }
}

/// Implementation of the ResponseError trait for AppError.
///
/// ## HTTP Status Code Mapping:
/// - Internal → 500 (Internal Server Error)
/// - BadRequest/ValidationError → 400 (Bad Request)
/// - NotFound → 404 (Not Found)
/// - Upstream/ReplyWithoutAudio → 502 (Bad Gateway)
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) | AppError::ReplyWithoutAudio { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "type": self.error_type(),
            "message": self.to_string(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if let AppError::ReplyWithoutAudio { reply_text, .. } = self {
            body["reply_text"] = json!(reply_text);
        }

        HttpResponse::build(self.status_code()).json(json!({ "error": body }))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Turn failures keep the distinction the core makes:
/// caller mistakes are 4xx, a missing reply is an upstream failure, and a
/// reply without audio still hands the text back to the client.
impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        if let Some(reply_text) = err.reply_text() {
            return AppError::ReplyWithoutAudio {
                message: err.to_string(),
                reply_text: reply_text.to_string(),
            };
        }

        match err {
            TurnError::TranscriptMissing { .. } => AppError::NotFound(err.to_string()),
            TurnError::Generation(_) => AppError::Upstream(err.to_string()),
            _ if err.is_caller_error() => AppError::ValidationError(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(_) => AppError::ValidationError(err.to_string()),
            StorageError::Transport(_) | StorageError::Status { .. } => AppError::Upstream(err.to_string()),
            _ => AppError::Internal(err.to_string()),
        }
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;
