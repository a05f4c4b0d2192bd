//! Error handling module
//!
//! This module provides centralized error handling for the billing core.

use thiserror::Error;

/// Application error types
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gateway error {code}: {message}")]
    Gateway { code: String, message: String },

    #[error("Unable to retrieve payment details")]
    Decryption,

    #[error("Failed to secure payment details")]
    Encryption,

    #[error("Primary payment method {method_id} is in use while a balance is outstanding")]
    PrimaryMethodInUse { method_id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Webhook rejected: {0}")]
    Unauthorized(String),

    #[error("JSON serialization error: {0}")]
    Json(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a gateway error from a code and message
    pub fn gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Gateway {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Wrap a storage failure with the operation that caused it
    pub fn storage(operation: &str, err: impl std::fmt::Display) -> Self {
        AppError::Storage(format!("{}: {}", operation, err))
    }

    /// Message safe to show on customer-facing surfaces.
    ///
    /// Gateway codes, storage details and cipher internals never cross this boundary.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(_) => "The requested record could not be found".to_string(),
            AppError::PrimaryMethodInUse { .. } => {
                "Set a different primary payment method before removing this one".to_string()
            }
            AppError::Decryption => "Unable to retrieve payment details".to_string(),
            AppError::Encryption => "Failed to secure payment details".to_string(),
            AppError::Gateway { .. } => {
                "Could not complete the request with the payment provider".to_string()
            }
            AppError::Unauthorized(_) | AppError::Authentication(_) => {
                "Request could not be authenticated".to_string()
            }
            AppError::Forbidden(_) => "You do not have access to this record".to_string(),
            AppError::Conflict(_) => "The request was superseded, please try again".to_string(),
            AppError::RateLimited => "Too many requests, please slow down".to_string(),
            _ => "Could not complete the request".to_string(),
        }
    }

    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            AppError::Validation(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PrimaryMethodInUse { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) | AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

impl warp::reject::Reject for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Storage(format!("redis: {}", err))
    }
}
