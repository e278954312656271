use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub enum AppError {
    // Caller contract violations
    InvalidIdentifier,
    InvalidCost,
    CounterOverflow,

    // Counter store errors
    StoreUnavailable(String),

    // Lookup errors
    WindowNotFound,

    // Configuration errors
    Configuration(String),

    // Internal errors
    Internal(String),
}

impl AppError {
    /// Short machine-readable label, used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidIdentifier => "invalid_identifier",
            AppError::InvalidCost => "invalid_cost",
            AppError::CounterOverflow => "counter_overflow",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::WindowNotFound => "window_not_found",
            AppError::Configuration(_) => "configuration",
            AppError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidIdentifier => write!(f, "Identifier must not be empty"),
            AppError::InvalidCost => write!(
                f,
                "Cost must be between 1 and {} points",
                crate::limiter::MAX_POINTS
            ),
            AppError::CounterOverflow => {
                write!(f, "Points would overflow the window counter")
            }
            AppError::StoreUnavailable(msg) => write!(f, "Counter store unavailable: {}", msg),
            AppError::WindowNotFound => write!(f, "No active window for identifier"),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        // INCRBY refuses to leave the signed 64-bit range; that is the caller's doing
        if err.to_string().contains("would overflow") {
            return AppError::CounterOverflow;
        }
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<prometheus::Error> for AppError {
    fn from(err: prometheus::Error) -> Self {
        AppError::Internal(format!("Metrics export failed: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

// Implement IntoResponse for Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidIdentifier | AppError::InvalidCost | AppError::CounterOverflow => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::StoreUnavailable(_) => {
                tracing::error!("Counter store error: {:?}", self);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Counter store unavailable".to_string(),
                )
            }
            AppError::WindowNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Configuration(_) => {
                tracing::error!("Configuration error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;
