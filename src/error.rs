//! Error types for chatroute
//!
//! All errors implement `IntoResponse` for Axum handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Maximum number of characters kept from a provider error body
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error(
        "Configuration error: {var} not set. Add your key to .env or export it before starting"
    )]
    MissingCredential { var: String },

    #[error(
        "Configuration error: {var} still holds the placeholder value. Replace it with a real key"
    )]
    PlaceholderCredential { var: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    ModelQuery(#[from] ModelQueryError),

    #[error("Turn did not complete within {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for every configuration-class error (file, parse, validation, credentials)
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigFileRead { .. }
                | Self::ConfigParseFailed { .. }
                | Self::ConfigValidationFailed { .. }
                | Self::MissingCredential { .. }
                | Self::PlaceholderCredential { .. }
        )
    }
}

/// Failures talking to the language-model provider
///
/// None of these are retried. They surface to the caller as-is.
#[derive(Error, Debug)]
pub enum ModelQueryError {
    #[error("Request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("{endpoint} aborted the stream: {message}")]
    Provider { endpoint: String, message: String },

    #[error("Model at {endpoint} returned no content")]
    EmptyResponse { endpoint: String },

    #[error("Stream from {endpoint} interrupted after {bytes_received} bytes: {reason}")]
    StreamInterrupted {
        endpoint: String,
        bytes_received: usize,
        reason: String,
    },
}

impl ModelQueryError {
    /// Build a `Status` error, keeping at most 500 characters of the body
    pub fn status(endpoint: impl Into<String>, status: u16, body: &str) -> Self {
        let preview = if body.chars().count() > MAX_ERROR_BODY_CHARS {
            let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!("{}... [truncated]", truncated)
        } else {
            body.to_string()
        };
        Self::Status {
            endpoint: endpoint.into(),
            status,
            body: preview,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ModelQuery(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
