use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Body shape used by XRPC error responses.
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (error, message) = match self {
            AppError::BadRequest(msg) => ("InvalidRequest", msg.clone()),
            AppError::UnsupportedAlgorithm(msg) => ("UnsupportedAlgorithm", msg.clone()),
            // Storage and internal details stay in the logs.
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                ("InternalServerError", "Internal server error".to_string())
            }
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error.to_string(),
            message,
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::UnsupportedAlgorithm(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Errors raised while loading process configuration or the keyword policy.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to read filter settings from {path}: {reason}")]
    SettingsFile { path: String, reason: String },
}

/// Failure of the engagement/text fetch collaborator.
///
/// Kept distinct from a zero-engagement result so callers can skip the item
/// instead of scoring it down.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("post not found")]
    NotFound,

    #[error("post has no text")]
    MissingText,

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("request timed out")]
    Timeout,
}

/// A feed cursor that does not decode to a ranking position.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CursorError {
    #[error("cursor is not valid base64 text")]
    Encoding,

    #[error("cursor has a malformed {0} field")]
    Field(&'static str),
}

impl From<CursorError> for AppError {
    fn from(err: CursorError) -> Self {
        AppError::BadRequest(format!("Invalid cursor: {}", err))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClassifierError {
    #[error("classifier transport error: {0}")]
    Transport(String),

    #[error("classifier returned status {0}")]
    Status(u16),

    #[error("classifier returned no usable verdict: {0}")]
    NoVerdict(String),

    #[error("classifier call timed out")]
    Timeout,
}
